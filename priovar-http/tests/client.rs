use priovar_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_sends_token_and_decodes_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/priovar/medicalCenter/7"))
        .and(header("authorization", "Token abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Hacettepe" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/priovar", server.uri()))
        .unwrap()
        .with_token("abc123");
    let got: Value = client
        .get_json(&["medicalCenter", "7"], RequestOpts::default())
        .await
        .unwrap();

    assert_eq!(got["name"], "Hacettepe");
}

#[tokio::test]
async fn per_request_auth_overrides_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(query_param("verbose", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_token("abc");
    let ok: bool = client
        .get_json(
            &["ping"],
            RequestOpts {
                auth: Some(Auth::None),
                query: Some(vec![("verbose", "1".into())]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(ok);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn post_serializes_body_and_accepts_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file/12/notes"))
        .and(body_json(json!({ "notes": "re-run with panel" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let () = client
        .post_json(
            &["file", "12", "notes"],
            &json!({ "notes": "re-run with panel" }),
            RequestOpts::default(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/patient/9"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("x-request-id", "srv-1")
                .set_body_json(json!({
                    "status": 404,
                    "error": "Not Found",
                    "message": "Patient 9 not found"
                })),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .delete::<()>(&["patient", "9"], RequestOpts::default())
        .await
        .unwrap_err();

    match err {
        HttpError::Api {
            status,
            message,
            request_id,
        } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "Patient 9 not found");
            assert_eq!(request_id, "srv-1");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn idempotent_requests_retry_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(1);
    let rows: Vec<Value> = client
        .get_json(&["patients"], RequestOpts::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn posts_are_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file/vcf/3/annotate"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(3);
    let err = client
        .post_json::<_, Value>(&["file", "vcf", "3", "annotate"], &json!({}), RequestOpts::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri())
        .unwrap()
        .with_timeout(Duration::from_millis(50));
    let err = client
        .get_json::<Value>(&["slow"], RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_json::<Value>(&["broken"], RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Decode(_, ref snippet) if snippet.contains("not json")));
}

#[tokio::test]
async fn acknowledgements_ignore_plain_text_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file/4/finish"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Finish info updated"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/patient/4"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    client
        .post_ack::<()>(&["file", "4", "finish"], None, RequestOpts::default())
        .await
        .unwrap();
    client
        .delete_ack(&["patient", "4"], RequestOpts::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn ids_stay_inside_their_segment() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/patient/..%2FmedicalCenter%2F7%3Fx"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/api", server.uri())).unwrap();
    client
        .delete_ack(&["patient", "../medicalCenter/7?x"], RequestOpts::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn dot_segments_are_refused() {
    let server = MockServer::start().await;
    let client = HttpClient::new(&server.uri()).unwrap();
    for id in ["..", ".", ""] {
        let err = client
            .delete_ack(&["patient", id], RequestOpts::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Url(_)), "{id:?} gave {err:?}");
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}
