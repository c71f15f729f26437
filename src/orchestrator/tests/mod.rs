use super::test_helpers::*;
use super::*;
use crate::types::JobStatus;
