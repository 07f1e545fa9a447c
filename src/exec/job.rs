// src/exec/job.rs

use std::fmt;

use crate::block::BlockRange;
use crate::exec::client::Request;
use crate::types::Modules;

/// One dispatchable unit of backfill work: compute `module_name` over
/// `request_range` in partial mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    pub module_name: String,
    pub request_range: BlockRange,
}

impl Job {
    pub fn new(module_name: impl Into<String>, request_range: BlockRange) -> Self {
        Self {
            module_name: module_name.into(),
            request_range,
        }
    }

    /// The remote request for this job, carrying the whole original module
    /// set so the remote side can rebuild the computation.
    pub fn create_request(&self, original_modules: &Modules) -> Request {
        Request {
            start_block_num: self.request_range.start_block,
            stop_block_num: self.request_range.exclusive_end_block,
            output_modules: vec![self.module_name.clone()],
            modules: Modules::clone(original_modules),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.module_name, self.request_range)
    }
}
