//! Interactive consent flow
//!
//! Opens (or prints) the Google consent URL and waits on a loopback listener
//! for the authorization code redirect.

use std::collections::HashMap;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use super::oauth::{generate_code_challenge, generate_code_verifier, OAuthClient, OAuthTokens};
use crate::GoogleError;

/// How long to wait for the browser redirect.
pub const CONSENT_TIMEOUT: Duration = Duration::from_secs(120);

/// How the consent URL reaches the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentPrompt {
    /// Open the system browser, printing the URL if that fails.
    OpenBrowser,
    /// Only print the URL to stderr.
    PrintUrl,
}

/// Run the installed-app flow: PKCE, loopback redirect, code exchange.
pub async fn run_consent_flow(
    oauth: &OAuthClient,
    scopes: &[String],
    prompt: ConsentPrompt,
) -> Result<OAuthTokens, GoogleError> {
    let code_verifier = generate_code_verifier();
    let code_challenge = generate_code_challenge(&code_verifier);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
    info!("OAuth callback server listening on {}", redirect_uri);

    let state = generate_state();
    let auth_url = oauth.authorize_url(scopes, &state, &code_challenge, &redirect_uri);

    match prompt {
        ConsentPrompt::OpenBrowser => {
            info!("Opening browser for OAuth authorization");
            if let Err(e) = open::that(&auth_url) {
                warn!("Failed to open browser automatically: {}", e);
                print_consent_url(&auth_url);
            }
        }
        ConsentPrompt::PrintUrl => print_consent_url(&auth_url),
    }

    let code = timeout(CONSENT_TIMEOUT, wait_for_callback(&listener, &state))
        .await
        .map_err(|_| {
            GoogleError::OAuthFlow(format!(
                "timed out after {} seconds waiting for consent",
                CONSENT_TIMEOUT.as_secs()
            ))
        })??;

    oauth.exchange_code(&code, &code_verifier, &redirect_uri).await
}

// stdout carries the protocol, so the URL goes to stderr.
fn print_consent_url(url: &str) {
    eprintln!("Open this URL in a browser to authorize access:\n\n{}\n", url);
}

/// Accept connections until one carries the OAuth redirect, returning the code.
pub async fn wait_for_callback(listener: &TcpListener, state: &str) -> Result<String, GoogleError> {
    loop {
        let (mut socket, _) = listener.accept().await?;

        let mut request_line = String::new();
        {
            let mut reader = BufReader::new(&mut socket);
            reader.read_line(&mut request_line).await?;
            // Drain the remaining request headers
            let mut header = String::new();
            while reader.read_line(&mut header).await? > 2 {
                header.clear();
            }
        }

        // Parse the request line: "GET /path?query HTTP/1.1"
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let query = parts[1].split_once('?').map(|(_, q)| q).unwrap_or("");
        let params = parse_query_params(query);

        if let (Some(code), Some(received_state)) = (params.get("code"), params.get("state")) {
            if received_state != state {
                send_response(&mut socket, "400 Bad Request", &result_html("Invalid state parameter. Please try again.")).await?;
                return Err(GoogleError::OAuthFlow("state mismatch in OAuth callback".to_string()));
            }
            send_response(&mut socket, "200 OK", &result_html("Authentication successful! You can close this tab.")).await?;
            return Ok(code.clone());
        }

        if let Some(error) = params.get("error") {
            let desc = params
                .get("error_description")
                .map(String::as_str)
                .unwrap_or("Unknown error");
            send_response(&mut socket, "400 Bad Request", &result_html(&format!("Error: {} - {}", error, desc))).await?;
            return Err(GoogleError::OAuthFlow(format!("{}: {}", error, desc)));
        }

        // Favicon requests and the like
        send_response(&mut socket, "404 Not Found", &result_html("Waiting for authorization...")).await?;
    }
}

/// Generate a random state string for CSRF protection
fn generate_state() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::rngs::OsRng.gen();
    hex::encode(bytes)
}

/// Parse URL query parameters into a HashMap
fn parse_query_params(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let decoded = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key.to_string(), decoded))
        })
        .collect()
}

async fn send_response(socket: &mut TcpStream, status: &str, html: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        html.len(),
        html
    );
    socket.write_all(response.as_bytes()).await?;
    socket.flush().await?;
    Ok(())
}

fn result_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>gworkspace-mcp</title></head>
<body style="font-family: sans-serif; text-align: center; margin-top: 4rem;">
    <h1>gworkspace-mcp</h1>
    <p>{}</p>
</body>
</html>"#,
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn send_request(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_parse_query_params() {
        let params = parse_query_params("code=4%2F0Ab&state=xyz&scope=a+b&flag");
        assert_eq!(params.get("code").unwrap(), "4/0Ab");
        assert_eq!(params.get("scope").unwrap(), "a b");
        assert!(!params.contains_key("flag"));
    }

    #[test]
    fn test_state_is_hex() {
        let state = generate_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(state, generate_state());
    }

    #[tokio::test]
    async fn test_callback_returns_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = tokio::spawn(async move {
            let favicon = send_request(port, "/favicon.ico").await;
            let done = send_request(port, "/?state=abc&code=4%2Fcode").await;
            (favicon, done)
        });

        let code = wait_for_callback(&listener, "abc").await.unwrap();
        assert_eq!(code, "4/code");

        let (favicon, done) = client.await.unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(done.starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_callback_rejects_state_mismatch() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = tokio::spawn(async move { send_request(port, "/?state=evil&code=x").await });

        let err = wait_for_callback(&listener, "abc").await.unwrap_err();
        assert!(matches!(err, GoogleError::OAuthFlow(_)));
        assert!(client.await.unwrap().starts_with("HTTP/1.1 400"));
    }

    #[tokio::test]
    async fn test_callback_reports_denied_consent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = tokio::spawn(async move { send_request(port, "/?error=access_denied").await });

        let err = wait_for_callback(&listener, "abc").await.unwrap_err();
        assert!(err.to_string().contains("access_denied"));
        client.await.unwrap();
    }
}
