//! Identity-bound backend transport
//!
//! Owns the HTTP client for one identity and stamps every outbound request
//! with the header set the backend requires. Client and headers are derived
//! from the same [`Identity`] value, so the advertised browser signature can
//! never drift from the transport actually carrying the request. A fresh
//! transport is built for every session refresh.

use crate::{Result, config::Settings, identity::Identity, types::NegotiationResponse};
use reqwest::{Client, Method, Proxy};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Path of the session negotiation endpoint
pub const NEGOTIATION_PATH: &str = "/backend-anon/sentinel/chat-requirements";

/// Header carrying the device identifier
pub const DEVICE_ID_HEADER: &str = "oai-device-id";

/// Header carrying the negotiated session token on application requests
pub const REQUIREMENTS_TOKEN_HEADER: &str = "openai-sentinel-chat-requirements-token";

/// Header carrying the proof-of-work solution on application requests
pub const PROOF_TOKEN_HEADER: &str = "openai-sentinel-proof-token";

/// HTTP transport bound to a single identity
#[derive(Debug)]
pub struct BackendTransport {
    /// Client configured with the identity's egress and the fixed timeout
    client: Client,
    /// Identity the client was built for
    identity: Identity,
    /// Backend base URL
    base_url: Url,
    /// Origin string stamped into `origin`/`referer`
    origin: String,
}

impl BackendTransport {
    /// Build a transport for the given identity.
    pub fn new(identity: Identity, settings: &Settings) -> Result<Self> {
        let base_url = Url::parse(&settings.backend.base_url)?;
        let origin = base_url.origin().ascii_serialization();

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(settings.network.request_timeout))
            .connect_timeout(Duration::from_secs(settings.network.connect_timeout));

        // The egress point comes from the identity alone; ambient proxy
        // environment variables must not leak into the binding.
        if let Some(egress) = identity.egress() {
            let proxy = Proxy::all(egress).map_err(|e| {
                crate::Error::transport(format!("invalid egress proxy '{}': {}", egress, e))
            })?;
            builder = builder.proxy(proxy);
        } else {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::transport(format!("client construction failed: {}", e)))?;

        debug!(
            "Transport bound to identity {} (egress: {})",
            identity.label(),
            identity.egress().unwrap_or("direct")
        );

        Ok(Self {
            client,
            identity,
            base_url,
            origin,
        })
    }

    /// Identity this transport is bound to
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Build a request carrying the backend-mandated header set.
    ///
    /// Locale and user-agent headers come from the bound identity, never from
    /// global defaults; the backend rejects requests whose headers disagree
    /// with the transport fingerprint.
    pub fn stamped_request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.base_url.join(path)?;

        Ok(self
            .client
            .request(method, url)
            .header("origin", &self.origin)
            .header("referer", &self.origin)
            .header("accept", "*/*")
            .header("cache-control", "no-cache")
            .header("content-type", "application/json")
            .header("pragma", "no-cache")
            .header("sec-ch-ua-mobile", "?0")
            .header("sec-fetch-dest", "empty")
            .header("sec-fetch-mode", "cors")
            .header("sec-fetch-site", "same-origin")
            .header("oai-language", self.identity.locale())
            .header("accept-language", self.identity.locale())
            .header("User-Agent", self.identity.user_agent()))
    }

    /// Perform the negotiation exchange for a new session.
    ///
    /// Exactly one POST per call. Non-success statuses and unreachable
    /// backends surface as negotiation failures; a malformed body surfaces as
    /// a decode failure. The caller decides what to do with challenge flags.
    pub async fn negotiate_session(&self, device_id: &str) -> Result<NegotiationResponse> {
        debug!("Negotiating session for device {}", device_id);

        let response = self
            .stamped_request(Method::POST, NEGOTIATION_PATH)?
            .header(DEVICE_ID_HEADER, device_id)
            .send()
            .await
            .map_err(|e| {
                warn!("Negotiation request failed to complete: {}", e);
                crate::Error::negotiation_timeout()
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Negotiation rejected with status {}", status);
            return Err(crate::Error::negotiation_status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| crate::Error::decode(format!("failed to read response body: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| crate::Error::decode(format!("malformed negotiation body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> Identity {
        Identity::new(None, "StampAgent/9.0", "fr-FR", "test-slot")
    }

    #[test]
    fn test_transport_construction_direct() {
        let transport = BackendTransport::new(test_identity(), &Settings::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn test_transport_rejects_invalid_egress() {
        let identity = Identity::new(
            Some("not a proxy url".to_string()),
            "Agent/1.0",
            "en-US",
            "bad-slot",
        );
        let err = BackendTransport::new(identity, &Settings::default()).unwrap_err();
        assert!(matches!(err, crate::Error::TransportConstruction { .. }));
    }

    #[test]
    fn test_stamped_request_carries_identity_headers() {
        let transport = BackendTransport::new(test_identity(), &Settings::default()).unwrap();

        let request = transport
            .stamped_request(Method::POST, NEGOTIATION_PATH)
            .unwrap()
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers["User-Agent"], "StampAgent/9.0");
        assert_eq!(headers["oai-language"], "fr-FR");
        assert_eq!(headers["accept-language"], "fr-FR");
        assert_eq!(headers["origin"], "https://chat.openai.com");
        assert_eq!(headers["referer"], "https://chat.openai.com");
        assert_eq!(headers["sec-fetch-mode"], "cors");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(request.url().path(), NEGOTIATION_PATH);
    }

    #[test]
    fn test_origin_strips_path_from_base_url() {
        let mut settings = Settings::default();
        settings.backend.base_url = "https://chat.example.test:8443/ignored".to_string();

        let transport = BackendTransport::new(test_identity(), &settings).unwrap();
        let request = transport
            .stamped_request(Method::POST, NEGOTIATION_PATH)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.headers()["origin"],
            "https://chat.example.test:8443"
        );
    }
}
