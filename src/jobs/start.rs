use crate::jobs::{Invocation, ToolJob};
use crate::types::JobName;

/// Root of every graph. Runs nothing; its children are the tool jobs.
#[derive(Debug, Default)]
pub struct StartJob;

impl StartJob {
    pub fn new() -> Self {
        Self
    }
}

impl ToolJob for StartJob {
    fn name(&self) -> JobName {
        JobName::new("start")
    }

    fn invocation(&self) -> Option<Invocation> {
        None
    }
}
