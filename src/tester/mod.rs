//! Replays resource expectations against a real server.

pub mod errors;
pub mod report;

use std::{collections::BTreeMap, sync::Arc, time::Duration, time::Instant};

use futures::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::resource::Resource;
use crate::metrics::report_metric;
use crate::validation::{ActualResponse, ResponseValidator};

pub use errors::ExchangeError;
pub use report::{EndpointOutcome, ResourceReport, TestReport, TestStatus};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TesterOptions {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for TesterOptions {
    fn default() -> Self {
        TesterOptions {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

struct Job {
    resource_idx: usize,
    endpoint_idx: usize,
    resource: Arc<Resource>,
    endpoint: String,
}

pub struct ContractTester {
    client: reqwest::Client,
    base_url: String,
    validator: ResponseValidator,
    options: TesterOptions,
}

async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone: nobody can cancel any more.
            std::future::pending::<()>().await;
        }
    }
}

impl ContractTester {
    pub fn new(
        base_url: &str,
        validator: ResponseValidator,
        options: TesterOptions,
    ) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ExchangeError::Request(errors::error_chain(&e)))?;
        Ok(ContractTester {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            validator,
            options,
        })
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn exchange(&self, resource: &Resource, url: &str) -> Result<ActualResponse, ExchangeError> {
        let method = reqwest::Method::from_bytes(resource.method().as_bytes())
            .map_err(|_| ExchangeError::InvalidMethod(resource.method().to_string()))?;

        let mut request = self.client.request(method, url);
        for (name, value) in resource.request_headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match resource.request_body() {
            Some(Value::String(text)) => request.body(text.clone()),
            Some(body) => request.json(body),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::from_send(e, self.options.timeout))?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::Body(errors::error_chain(&e)))?;

        Ok(ActualResponse::new(status, headers, ActualResponse::parse_body(&text)))
    }

    async fn run_job(&self, job: Job) -> ((usize, usize), EndpointOutcome) {
        let url = self.url_for(&job.endpoint);
        let metric = report_metric(format!(
            "test {} {} {}",
            job.resource.name(),
            job.resource.method(),
            job.endpoint
        ));
        let started = Instant::now();

        // Each request gets its own deadline; one slow endpoint never holds up siblings.
        let exchanged = match tokio::time::timeout(
            self.options.timeout,
            self.exchange(&job.resource, &url),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout(self.options.timeout)),
        };

        let status = match exchanged {
            Ok(actual) => {
                let result = self.validator.validate(&job.resource, &actual);
                if result.success() {
                    TestStatus::Pass
                } else {
                    TestStatus::Fail {
                        problems: result.into_problems(),
                    }
                }
            }
            Err(err) => TestStatus::Error {
                message: err.to_string(),
            },
        };

        if status.is_pass() {
            metric.success();
        } else {
            metric.fail();
        }
        debug!(resource = %job.resource.name(), %url, status = status.label(), "Contract test finished");

        let outcome = EndpointOutcome {
            method: job.resource.method().to_string(),
            endpoint: job.endpoint,
            url,
            elapsed_ms: started.elapsed().as_millis() as u64,
            status,
        };
        ((job.resource_idx, job.endpoint_idx), outcome)
    }

    /// Tests every non-serve-only resource on each of its test endpoints.
    pub async fn run(&self, resources: &[Arc<Resource>]) -> TestReport {
        let (_never_cancel, cancel) = watch::channel(false);
        self.run_until(resources, cancel).await
    }

    /// Like [`ContractTester::run`], but stops scheduling new requests once `cancel`
    /// turns true. In-flight requests are abandoned and the report is marked incomplete.
    pub async fn run_until(
        &self,
        resources: &[Arc<Resource>],
        mut cancel: watch::Receiver<bool>,
    ) -> TestReport {
        let jobs: Vec<Job> = resources
            .iter()
            .enumerate()
            .filter(|(_, resource)| !resource.serve_only())
            .flat_map(|(resource_idx, resource)| {
                resource
                    .test_endpoints()
                    .iter()
                    .enumerate()
                    .map(move |(endpoint_idx, endpoint)| Job {
                        resource_idx,
                        endpoint_idx,
                        resource: Arc::clone(resource),
                        endpoint: endpoint.clone(),
                    })
            })
            .collect();
        let scheduled = jobs.len();

        let mut results = stream::iter(jobs)
            .map(|job| self.run_job(job))
            .buffer_unordered(self.options.concurrency.max(1));

        let mut outcomes: BTreeMap<(usize, usize), EndpointOutcome> = BTreeMap::new();
        let mut complete = true;
        loop {
            tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => {
                    warn!(finished = outcomes.len(), scheduled, "Contract test run cancelled");
                    complete = false;
                    break;
                }
                next = results.next() => match next {
                    Some((key, outcome)) => {
                        outcomes.insert(key, outcome);
                    }
                    None => break,
                },
            }
        }
        // Abandons whatever is still in flight after a cancel.
        drop(results);

        let mut grouped: BTreeMap<usize, Vec<EndpointOutcome>> = BTreeMap::new();
        for ((resource_idx, _), outcome) in outcomes {
            grouped.entry(resource_idx).or_default().push(outcome);
        }
        let reports = grouped
            .into_iter()
            .map(|(idx, endpoints)| ResourceReport {
                name: resources[idx].name().to_string(),
                endpoints,
            })
            .collect();

        TestReport::new(reports, scheduled, complete)
    }
}
