use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{CallRequest, CallResponse};

/// Model backend: one request, one normalized reply.
///
/// Implemented by the provider gateway; tests substitute scripted stubs.
pub trait ModelClient: Send + Sync + 'static {
    fn call(&self, request: CallRequest) -> BoxFuture<'_, Result<CallResponse>>;
}
