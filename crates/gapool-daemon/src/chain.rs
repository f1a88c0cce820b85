// crates/gapool-daemon/src/chain.rs
//
// NodeRpcClient: ChainClient over the chain node's HTTP JSON-RPC `getwork`
// call.
//
// `getwork` with no params returns the current `{data, difficulty}` job;
// with `[data]` it submits a solution and returns whether the node accepted
// it. The node only accepts a solution that extends its chain, so an
// accepted solution always advances the chain.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use gapool_core::{ChainClient, GapoolError, JobTemplate, SolutionPayload, SubmitVerdict};

/// JSON-RPC client for the chain node.
#[derive(Debug, Clone)]
pub struct NodeRpcClient {
    /// Node endpoint (e.g., "http://127.0.0.1:31397").
    url: String,
    user: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl NodeRpcClient {
    /// Create a client. `timeout` bounds each HTTP exchange.
    pub fn new(
        url: &str,
        user: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            url: url.to_string(),
            user,
            password,
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one `getwork` call and return its `result` member.
    async fn getwork(&self, params: Value) -> Result<Value, GapoolError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "gapool",
            "method": "getwork",
            "params": params,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| GapoolError::UpstreamUnavailable(format!("getwork request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::INTERNAL_SERVER_ERROR {
            return Err(GapoolError::UpstreamUnavailable(format!(
                "chain node returned HTTP {}",
                status
            )));
        }

        // Nodes report RPC-level errors as HTTP 500 with a JSON body.
        let envelope: Value = response.json().await.map_err(|e| {
            GapoolError::UpstreamMalformedResponse(format!("getwork body is not JSON: {}", e))
        })?;

        extract_result(envelope)
    }
}

#[async_trait]
impl ChainClient for NodeRpcClient {
    async fn fetch_job(&self) -> Result<JobTemplate, GapoolError> {
        let result = self.getwork(json!([])).await?;
        parse_job_result(&result)
    }

    async fn submit(&self, solution: &SolutionPayload) -> Result<SubmitVerdict, GapoolError> {
        let result = self.getwork(json!([solution.data])).await?;
        parse_submit_result(&result)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Pull `result` out of a JSON-RPC 1.0 envelope, turning a non-null `error`
/// into `UpstreamMalformedResponse`.
pub fn extract_result(envelope: Value) -> Result<Value, GapoolError> {
    let mut envelope = match envelope {
        Value::Object(map) => map,
        other => {
            return Err(GapoolError::UpstreamMalformedResponse(format!(
                "expected a JSON-RPC object, got {}",
                other
            )))
        }
    };

    match envelope.remove("error") {
        None | Some(Value::Null) => {}
        Some(err) => {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(GapoolError::UpstreamMalformedResponse(format!(
                "chain node error: {}",
                message
            )));
        }
    }

    envelope
        .remove("result")
        .ok_or_else(|| GapoolError::UpstreamMalformedResponse("missing result".to_string()))
}

/// Decode a fetch result: an object with string `data` and non-negative
/// integer `difficulty`.
pub fn parse_job_result(result: &Value) -> Result<JobTemplate, GapoolError> {
    let data = result
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| GapoolError::UpstreamMalformedResponse(format!("no string data in {}", result)))?;
    let difficulty = result
        .get("difficulty")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            GapoolError::UpstreamMalformedResponse(format!("no integer difficulty in {}", result))
        })?;

    Ok(JobTemplate::new(data, difficulty))
}

/// Decode a submit result: a bare boolean.
pub fn parse_submit_result(result: &Value) -> Result<SubmitVerdict, GapoolError> {
    match result.as_bool() {
        Some(true) => Ok(SubmitVerdict {
            accepted: true,
            advanced_chain: true,
            detail: None,
        }),
        Some(false) => Ok(SubmitVerdict::rejected("solution rejected by chain node")),
        None => Err(GapoolError::UpstreamMalformedResponse(format!(
            "expected a boolean submit result, got {}",
            result
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_result_is_decoded() {
        let job = parse_job_result(&json!({"data": "00ff", "difficulty": 20})).unwrap();
        assert_eq!(job.data(), "00ff");
        assert_eq!(job.difficulty(), 20);
    }

    #[test]
    fn job_result_with_wrong_shape_is_malformed() {
        let cases = [
            json!({"data": "00ff"}),
            json!({"difficulty": 20}),
            json!({"data": 7, "difficulty": 20}),
            json!({"data": "00ff", "difficulty": -1}),
            json!({"data": "00ff", "difficulty": "20"}),
            json!(true),
        ];
        for case in cases {
            match parse_job_result(&case) {
                Err(GapoolError::UpstreamMalformedResponse(_)) => {}
                other => panic!("{} should be malformed, got {:?}", case, other),
            }
        }
    }

    #[test]
    fn accepted_submit_advances_chain() {
        let verdict = parse_submit_result(&json!(true)).unwrap();
        assert!(verdict.accepted);
        assert!(verdict.advanced_chain);

        let verdict = parse_submit_result(&json!(false)).unwrap();
        assert!(!verdict.accepted);
        assert!(!verdict.advanced_chain);

        assert!(parse_submit_result(&json!("yes")).is_err());
    }

    #[test]
    fn envelope_error_is_reported() {
        let err = extract_result(json!({
            "result": null,
            "error": {"code": -8, "message": "invalid data"},
            "id": "gapool"
        }))
        .unwrap_err();
        match err {
            GapoolError::UpstreamMalformedResponse(msg) => assert!(msg.contains("invalid data")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn envelope_result_is_returned() {
        let result = extract_result(json!({"result": true, "error": null, "id": "gapool"})).unwrap();
        assert_eq!(result, json!(true));

        assert!(extract_result(json!({"error": null})).is_err());
        assert!(extract_result(json!([1, 2])).is_err());
    }

    #[tokio::test]
    async fn unreachable_node_is_unavailable() {
        // Port 9 on loopback is closed in test environments.
        let client = NodeRpcClient::new(
            "http://127.0.0.1:9",
            Some("user".into()),
            Some("pass".into()),
            Duration::from_secs(2),
        );
        match client.fetch_job().await {
            Err(GapoolError::UpstreamUnavailable(_)) => {}
            other => panic!("expected UpstreamUnavailable, got {:?}", other),
        }
    }
}
