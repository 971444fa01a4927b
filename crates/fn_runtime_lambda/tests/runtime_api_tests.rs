mod support;

use std::net::TcpListener;

use fn_runtime_lambda::adapters::control_plane::{ControlPlane, ControlPlaneError};
use fn_runtime_lambda::adapters::runtime_api::RuntimeApiClient;
use support::http_stub::{StubResponse, StubRuntimeApi};

fn client(stub: &StubRuntimeApi) -> RuntimeApiClient {
    RuntimeApiClient::new(stub.address()).expect("client builds")
}

#[test]
fn fetch_next_reads_envelope_from_headers() {
    let stub = StubRuntimeApi::start(vec![StubResponse::new(200, "OK")
        .header("Lambda-Runtime-Aws-Request-Id", "8476a536")
        .header("Lambda-Runtime-Deadline-Ms", "1542409706888")
        .header("Lambda-Runtime-Trace-Id", "Root=1-5bef4de7")
        .header("Lambda-Runtime-Client-Context", r#"{"custom":{"a":"b"}}"#)
        .body(r#"{"x":1}"#)]);

    let request = client(&stub).fetch_next().expect("fetch succeeds");
    let received = stub.finish();

    assert_eq!(received[0].method, "GET");
    assert_eq!(received[0].path, "/2018-06-01/runtime/invocation/next");
    assert_eq!(request.invocation_id, "8476a536");
    assert_eq!(request.deadline_epoch_ms, 1_542_409_706_888);
    assert_eq!(request.trace_id.as_deref(), Some("Root=1-5bef4de7"));
    assert_eq!(
        request.client_context_json.as_deref(),
        Some(r#"{"custom":{"a":"b"}}"#)
    );
    assert_eq!(request.body, br#"{"x":1}"#.to_vec());
}

#[test]
fn posts_go_to_their_endpoints_and_expect_accepted() {
    let stub = StubRuntimeApi::start(vec![
        StubResponse::new(202, "Accepted"),
        StubResponse::new(202, "Accepted"),
        StubResponse::new(202, "Accepted"),
    ]);
    let client = client(&stub);

    client
        .post_success("req-1", br#"{"y":2}"#)
        .expect("result accepted");
    client
        .post_error("req-2", br#"{"errorMessage":"boom"}"#)
        .expect("error accepted");
    client
        .post_init_error(br#"{"errorMessage":"bad config"}"#)
        .expect("init error accepted");
    let received = stub.finish();

    let paths: Vec<&str> = received.iter().map(|request| request.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/2018-06-01/runtime/invocation/req-1/response",
            "/2018-06-01/runtime/invocation/req-2/error",
            "/2018-06-01/runtime/init/error",
        ]
    );
    assert!(received.iter().all(|request| request.method == "POST"));
    assert_eq!(received[0].body, br#"{"y":2}"#.to_vec());
    assert_eq!(received[1].header("content-type"), Some("application/json"));
    assert_eq!(received[2].body, br#"{"errorMessage":"bad config"}"#.to_vec());
}

#[test]
fn invocation_id_cannot_retarget_the_post() {
    let stub = StubRuntimeApi::start(vec![StubResponse::new(202, "Accepted")]);
    client(&stub)
        .post_error("../../init/error?x#y", br#"{"errorMessage":"boom"}"#)
        .expect("error accepted");
    let received = stub.finish();

    assert_eq!(
        received[0].path,
        "/2018-06-01/runtime/invocation/..%2F..%2Finit%2Ferror%3Fx%23y/error"
    );
}

#[test]
fn empty_success_body_is_sent_as_is() {
    let stub = StubRuntimeApi::start(vec![StubResponse::new(202, "Accepted")]);
    client(&stub)
        .post_success("req-1", b"")
        .expect("result accepted");
    assert!(stub.finish()[0].body.is_empty());
}

#[test]
fn non_accepted_post_is_unexpected_status() {
    let stub = StubRuntimeApi::start(vec![
        StubResponse::new(413, "Payload Too Large").body("response too large")
    ]);

    let error = client(&stub)
        .post_success("req-1", b"{}")
        .expect_err("413 must be rejected");
    stub.finish();

    match error {
        ControlPlaneError::UnexpectedStatus {
            endpoint,
            status,
            body,
        } => {
            assert!(endpoint.ends_with("/invocation/req-1/response"));
            assert_eq!(status, 413);
            assert_eq!(body, "response too large");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn fetch_error_status_is_fatal() {
    let stub = StubRuntimeApi::start(vec![StubResponse::new(500, "Internal Server Error")]);
    let error = client(&stub).fetch_next().expect_err("500 must be rejected");
    stub.finish();
    assert!(matches!(
        error,
        ControlPlaneError::UnexpectedStatus { status: 500, .. }
    ));
}

#[test]
fn unreachable_control_plane_is_transport_error() {
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        listener.local_addr().expect("listener has an address").to_string()
    };

    let error = RuntimeApiClient::new(&address)
        .expect("client builds")
        .fetch_next()
        .expect_err("nothing is listening");
    assert!(matches!(error, ControlPlaneError::Transport { .. }));
}
