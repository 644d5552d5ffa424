use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{REGION_PATTERN, ROLE_ARN_PATTERN};

static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(REGION_PATTERN).expect("region pattern is valid"));

static ROLE_ARN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ROLE_ARN_PATTERN).expect("role ARN pattern is valid"));

/// Region must look like `us-west-2`
pub fn is_valid_region(region: &str) -> bool {
    REGION_RE.is_match(region)
}

/// Role ARN must look like `arn:aws:iam::123456789012:role/Name`
pub fn is_valid_role_arn(role_arn: &str) -> bool {
    ROLE_ARN_RE.is_match(role_arn)
}
