//! Job domain types

use crate::dto;

/// A unit of work claimed from the job server
///
/// Only constructed for jobs that carry a non-empty identifier; "no work"
/// responses are represented by [`Assignment::Idle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub payload: String,
}

/// Output of a processed job, reported back exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job_id: String,
    pub payload: String,
}

impl JobResult {
    pub fn new(job_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            payload: payload.into(),
        }
    }
}

impl From<JobResult> for dto::JobResult {
    fn from(result: JobResult) -> Self {
        Self {
            job_id: result.job_id,
            payload: result.payload,
        }
    }
}

/// What a single `RequestJob` round trip produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// No response, or a response without a job id
    Idle,
    /// A job with a non-empty id
    Job(Job),
}

impl Assignment {
    /// Classifies a (possibly absent) server response.
    pub fn from_response(response: Option<dto::Job>) -> Self {
        match response {
            Some(job) if !job.id.is_empty() => Self::Job(Job {
                id: job.id,
                payload: job.payload,
            }),
            _ => Self::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_job(id: &str, payload: &str) -> dto::Job {
        dto::Job {
            id: id.to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_absent_response_is_idle() {
        assert_eq!(Assignment::from_response(None), Assignment::Idle);
    }

    #[test]
    fn test_empty_id_is_idle_even_with_payload() {
        let assignment = Assignment::from_response(Some(wire_job("", "ignored")));
        assert_eq!(assignment, Assignment::Idle);
    }

    #[test]
    fn test_job_with_id_is_assigned() {
        let assignment = Assignment::from_response(Some(wire_job("42", "hello")));
        assert_eq!(
            assignment,
            Assignment::Job(Job {
                id: "42".to_string(),
                payload: "hello".to_string(),
            })
        );
    }

    #[test]
    fn test_job_result_into_dto() {
        let result: dto::JobResult = JobResult::new("42", "world").into();
        assert_eq!(result.job_id, "42");
        assert_eq!(result.payload, "world");
    }
}
