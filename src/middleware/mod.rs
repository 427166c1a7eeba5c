pub mod access_gate;
pub mod logging;
pub mod validation;

use async_trait::async_trait;
use axum::{body::Body, response::Response};

use crate::{context::RequestContext, error::EdgeResult};

pub enum ControlFlow {
    Continue,
    ShortCircuit(Response<Body>),
}

#[async_trait]
pub trait EdgeMiddleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_request(&self, ctx: &mut RequestContext) -> EdgeResult<ControlFlow>;

    async fn on_response(
        &self,
        _ctx: &RequestContext,
        _response: &mut Response<Body>,
    ) -> EdgeResult<()> {
        Ok(())
    }
}
