//! Verify query encoding against JSON test vectors stored in `test-vectors/`.
//!
//! Each case gives an endpoint and a params object; the built request URL must
//! carry exactly the expected decoded pairs, in order.

use inocore_connect::{ApiClient, ClientConfig, HttpMethod, QueryParams};
use serde_json::Value;
use url::Url;

const BASE_URL: &str = "http://localhost:8080/inocore";

fn client() -> ApiClient {
    ApiClient::new(ClientConfig::new(BASE_URL, "daemon@localhost", "daemon2k22", "tEsT@ino").unwrap())
}

#[test]
fn query_test_vectors() {
    let raw = include_str!("../../test-vectors/query.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let endpoint = case["endpoint"].as_str().unwrap();
        let params = QueryParams::try_from(case["params"].clone()).unwrap();
        let expected: Vec<(String, String)> = serde_json::from_value(case["expected_pairs"].clone()).unwrap();

        assert_eq!(params.to_pairs(), expected, "{name}: pairs");

        let req = c
            .build_request::<Value>(HttpMethod::Get, endpoint, None, Some(&params))
            .unwrap();
        let url = Url::parse(&req.url).unwrap();
        assert_eq!(
            url.path(),
            format!("/inocore/{}", endpoint.trim_start_matches('/')),
            "{name}: path"
        );
        let sent: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(sent, expected, "{name}: query string");
    }
}
