use std::fmt;

use serde::Serialize;

use crate::validation::Problem;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Pass,
    Fail { problems: Vec<Problem> },
    Error { message: String },
}

impl TestStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail { .. } => "FAIL",
            TestStatus::Error { .. } => "ERROR",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, TestStatus::Pass)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointOutcome {
    pub method: String,
    pub endpoint: String,
    pub url: String,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub status: TestStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub name: String,
    pub endpoints: Vec<EndpointOutcome>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Scheduled tests that never ran because the run was cancelled.
    pub not_run: usize,
}

/// Results of one contract-test run, grouped by resource then endpoint in
/// configuration order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub complete: bool,
    pub success: bool,
    pub summary: Summary,
    pub resources: Vec<ResourceReport>,
}

impl TestReport {
    pub fn new(resources: Vec<ResourceReport>, scheduled: usize, complete: bool) -> Self {
        let mut summary = Summary {
            total: scheduled,
            ..Summary::default()
        };
        for outcome in resources.iter().flat_map(|r| r.endpoints.iter()) {
            match outcome.status {
                TestStatus::Pass => summary.passed += 1,
                TestStatus::Fail { .. } => summary.failed += 1,
                TestStatus::Error { .. } => summary.errored += 1,
            }
        }
        summary.not_run = scheduled - (summary.passed + summary.failed + summary.errored);
        let success = complete && summary.not_run == 0 && summary.passed == scheduled;

        TestReport {
            complete,
            success,
            summary,
            resources,
        }
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &EndpointOutcome> {
        self.resources.iter().flat_map(|r| r.endpoints.iter())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for resource in &self.resources {
            writeln!(f, "{}", resource.name)?;
            for outcome in &resource.endpoints {
                writeln!(
                    f,
                    "  {:<5} {} {} ({} ms)",
                    outcome.status.label(),
                    outcome.method,
                    outcome.endpoint,
                    outcome.elapsed_ms
                )?;
                match &outcome.status {
                    TestStatus::Pass => {}
                    TestStatus::Fail { problems } => {
                        for problem in problems {
                            for (i, line) in problem.to_string().lines().enumerate() {
                                let indent = if i == 0 { "        - " } else { "          " };
                                writeln!(f, "{indent}{line}")?;
                            }
                        }
                    }
                    TestStatus::Error { message } => writeln!(f, "        ! {message}")?,
                }
            }
        }

        let s = &self.summary;
        if !self.complete {
            writeln!(f, "\nINCOMPLETE: run was cancelled, {} tests did not run", s.not_run)?;
        }
        write!(
            f,
            "\n{} tests: {} passed, {} failed, {} errored -> {}",
            s.total,
            s.passed,
            s.failed,
            s.errored,
            if self.success { "SUCCESS" } else { "FAILURE" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{problem::ROOT, ProblemType};

    fn outcome(endpoint: &str, status: TestStatus) -> EndpointOutcome {
        EndpointOutcome {
            method: "GET".into(),
            endpoint: endpoint.into(),
            url: format!("http://localhost{endpoint}"),
            elapsed_ms: 3,
            status,
        }
    }

    #[test]
    fn all_pass_is_success() {
        let report = TestReport::new(
            vec![ResourceReport {
                name: "Books".into(),
                endpoints: vec![outcome("/a", TestStatus::Pass), outcome("/b", TestStatus::Pass)],
            }],
            2,
            true,
        );
        assert!(report.success);
        assert_eq!(report.summary.passed, 2);
        assert!(report.to_string().contains("SUCCESS"));
    }

    #[test]
    fn failures_errors_and_cancellation_fail_the_run() {
        let fail = TestStatus::Fail {
            problems: vec![Problem::new(ProblemType::StatusCode, ROOT, "Expected 200 but received 500")],
        };
        let error = TestStatus::Error {
            message: "Connection failed".into(),
        };
        let report = TestReport::new(
            vec![ResourceReport {
                name: "Books".into(),
                endpoints: vec![outcome("/a", fail), outcome("/b", error)],
            }],
            3,
            false,
        );
        assert!(!report.success);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.errored, 1);
        assert_eq!(report.summary.not_run, 1);

        let text = report.to_string();
        assert!(text.contains("FAIL  GET /a"));
        assert!(text.contains("[STATUS_CODE] <root>: Expected 200 but received 500"));
        assert!(text.contains("ERROR GET /b"));
        assert!(text.contains("INCOMPLETE"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["complete"], false);
        assert_eq!(json["resources"][0]["endpoints"][0]["status"], "FAIL");
        assert_eq!(json["resources"][0]["endpoints"][1]["message"], "Connection failed");
    }
}
