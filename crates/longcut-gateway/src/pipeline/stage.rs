use async_trait::async_trait;

use crate::context::RequestContext;

use super::env::PipelineEnv;
use super::rejection::Rejection;
use super::state::PipelineState;

#[derive(Debug)]
pub enum StageResult {
    /// Context was updated in place; run the next stage.
    Continue,
    Reject(Rejection),
    Cancelled,
}

/// One step of a tier. Stages run strictly in list order.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// State the tier reaches once this stage continues, if it marks one.
    fn reaches(&self) -> Option<PipelineState> {
        None
    }

    async fn run(&self, env: &PipelineEnv, ctx: &mut RequestContext) -> StageResult;
}
