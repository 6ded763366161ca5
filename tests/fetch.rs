//! HTTP client behaviour against a local stub server.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use rpps_carteira::data::{CadprevClient, FetchError};
use rpps_carteira::domain::QueryParameters;

fn query() -> QueryParameters {
    QueryParameters {
        entity_id: "29131075000193".to_string(),
        region: "RJ".to_string(),
        year: 2025,
    }
}

/// Read the request head and return it as text.
fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve exactly one response and hand the request line back through the join handle.
fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/DAIR_CARTEIRA", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request.lines().next().unwrap_or_default().to_string()
    });
    (url, handle)
}

/// Answer one connection per scripted response, in order, then close each one.
fn serve_script(listener: TcpListener, responses: Vec<String>) -> thread::JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let mut request_lines = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            request_lines.push(request.lines().next().unwrap_or_default().to_string());
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
        }
        request_lines
    })
}

#[test]
fn success_returns_body_and_sends_query_parameters() {
    let (url, server) = serve_once("200 OK", r#"{"data":[]}"#);
    let client = CadprevClient::new(&url).unwrap();

    let payload = client.fetch(&query()).unwrap();
    assert_eq!(payload.status, 200);
    assert_eq!(payload.json().unwrap()["data"].as_array().map(Vec::len), Some(0));

    let request_line = server.join().unwrap();
    assert!(request_line.starts_with("GET /DAIR_CARTEIRA?"));
    assert!(request_line.contains("nr_cnpj_entidade=29131075000193"));
    assert!(request_line.contains("sg_uf=RJ"));
    assert!(request_line.contains("dt_ano=2025"));
}

#[test]
fn server_error_keeps_status_and_body() {
    let (url, server) = serve_once("500 Internal Server Error", "falha interna");
    let client = CadprevClient::new(&url).unwrap();

    let err = client.fetch(&query()).unwrap_err();
    match err {
        FetchError::Status { status, ref body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "falha interna");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(!err.is_transport());
    server.join().unwrap();
}

#[test]
fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/DAIR_CARTEIRA", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let _ = read_request(&mut stream);
        thread::sleep(Duration::from_secs(2));
    });

    let client = CadprevClient::with_timeout(&url, Duration::from_millis(300)).unwrap();
    let err = client.fetch(&query()).unwrap_err();
    assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_millis(300)), "{err:?}");
    assert!(err.is_transport());
    server.join().unwrap();
}

#[test]
fn refused_connection_is_a_connection_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{port}/DAIR_CARTEIRA");

    let err = CadprevClient::with_timeout(&url, Duration::from_secs(5))
        .unwrap()
        .fetch(&query())
        .unwrap_err();
    assert!(matches!(err, FetchError::Connection(_)), "{err:?}");
}

#[test]
fn invalid_endpoint_is_rejected_up_front() {
    assert!(matches!(CadprevClient::new("not a url"), Err(FetchError::Unexpected(_))));
}

#[test]
fn server_error_with_truncated_body_is_still_a_status_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/DAIR_CARTEIRA", listener.local_addr().unwrap());
    let server = serve_script(
        listener,
        vec!["HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\nConnection: close\r\n\r\nparcial".to_string()],
    );

    let err = CadprevClient::new(&url).unwrap().fetch(&query()).unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 500, .. }), "{err:?}");
    server.join().unwrap();
}

#[test]
fn redirect_to_another_host_still_returns_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let endpoint = format!("http://localhost:{port}/DAIR_CARTEIRA");
    let body = r#"{"data":[{"dt_mes_bimestre":1,"vl_total_atual":"1,00"}]}"#;
    let server = serve_script(
        listener,
        vec![
            format!(
                "HTTP/1.1 302 Found\r\nLocation: http://127.0.0.1:{port}/espelho\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            ),
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            ),
        ],
    );

    let client = CadprevClient::new(&endpoint).unwrap();
    let payload = client.fetch(&query()).unwrap();
    assert_eq!(payload.status, 200);
    assert_eq!(payload.url, format!("http://127.0.0.1:{port}/espelho"));
    assert_eq!(client.endpoint().host_str(), Some("localhost"));
    assert_eq!(payload.json().unwrap()["data"].as_array().map(Vec::len), Some(1));

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].starts_with("GET /espelho"));
}
