//! Admission control hook: a request carrying a workload-group id is
//! checked against that group before any planning work starts.
//!
//! The rejection policy itself lives outside this crate; it is reached
//! only through [`RejectionCheck`].

use std::collections::BTreeMap;
use thiserror::Error as ThisError;
use tracing::{debug, warn};

/// Request header naming the workload group a request belongs to.
pub const QUERY_GROUP_ID_HEADER: &str = "queryGroupId";

///
/// AdmissionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum AdmissionError {
    #[error("request rejected by query group [{group_id}]: {reason}")]
    Rejected { group_id: String, reason: String },
}

impl AdmissionError {
    pub fn rejected(group_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            group_id: group_id.into(),
            reason: reason.into(),
        }
    }
}

///
/// RejectionCheck
///
/// Workload-group policy: fails when the group is over its limits.
///

pub trait RejectionCheck {
    fn reject_if_needed(&self, group_id: &str) -> Result<(), AdmissionError>;
}

impl<F> RejectionCheck for F
where
    F: Fn(&str) -> Result<(), AdmissionError>,
{
    fn reject_if_needed(&self, group_id: &str) -> Result<(), AdmissionError> {
        self(group_id)
    }
}

///
/// RequestHeaders
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestHeaders(BTreeMap<String, String>);

impl RequestHeaders {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn query_group_id(&self) -> Option<&str> {
        self.get(QUERY_GROUP_ID_HEADER)
    }
}

///
/// RequestRejectionListener
///
/// Runs the rejection check at request start.
///

#[derive(Clone, Debug)]
pub struct RequestRejectionListener<C> {
    check: C,
}

impl<C: RejectionCheck> RequestRejectionListener<C> {
    pub const fn new(check: C) -> Self {
        Self { check }
    }

    /// Requests without a group id are admitted unchecked.
    pub fn on_request_start(&self, headers: &RequestHeaders) -> Result<(), AdmissionError> {
        let Some(group_id) = headers.query_group_id() else {
            return Ok(());
        };

        match self.check.reject_if_needed(group_id) {
            Ok(()) => {
                debug!(group_id, "request admitted");
                Ok(())
            }
            Err(err) => {
                warn!(group_id, error = %err, "request rejected");
                Err(err)
            }
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{
        AdmissionError, QUERY_GROUP_ID_HEADER, RequestHeaders, RequestRejectionListener,
    };
    use std::cell::RefCell;

    const GROUP_ID: &str = "asdgasgkajgkw3141_3rt4t";

    #[test]
    fn over_limit_group_is_rejected() {
        let listener = RequestRejectionListener::new(|group_id: &str| {
            Err(AdmissionError::rejected(group_id, "cpu limit exceeded"))
        });
        let headers = RequestHeaders::new().with(QUERY_GROUP_ID_HEADER, GROUP_ID);

        let err = listener
            .on_request_start(&headers)
            .expect_err("over-limit group should be rejected");
        assert_eq!(err, AdmissionError::rejected(GROUP_ID, "cpu limit exceeded"));
    }

    #[test]
    fn group_within_limits_is_admitted() {
        let seen = RefCell::new(Vec::new());
        let listener = RequestRejectionListener::new(|group_id: &str| {
            seen.borrow_mut().push(group_id.to_string());
            Ok(())
        });
        let headers = RequestHeaders::new().with(QUERY_GROUP_ID_HEADER, GROUP_ID);

        listener
            .on_request_start(&headers)
            .expect("group within limits should be admitted");
        assert_eq!(*seen.borrow(), vec![GROUP_ID.to_string()]);
    }

    #[test]
    fn request_without_group_skips_the_check() {
        let listener = RequestRejectionListener::new(|_: &str| -> Result<(), AdmissionError> {
            panic!("check should not run without a group id")
        });

        listener
            .on_request_start(&RequestHeaders::new())
            .expect("request without a group should be admitted");
    }
}
