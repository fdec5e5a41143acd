use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while turning a request string into a fetchable URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Parses a request string into an absolute `http`/`https` URL.
///
/// Relative input is joined onto `base` when one is given; without a base it
/// fails with [`url::ParseError::RelativeUrlWithoutBase`].
///
/// # Examples
///
/// ```
/// use feedfinder::util::parse_request_url;
///
/// let url = parse_request_url("/blog/", Some("https://example.com/")).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/blog/");
///
/// assert!(parse_request_url("/blog/", None).is_err());
/// assert!(parse_request_url("ftp://example.com/", None).is_err());
/// ```
pub fn parse_request_url(input: &str, base: Option<&str>) -> Result<Url, UrlValidationError> {
    let input = input.trim();
    let url = match Url::parse(input) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => Url::parse(base)?.join(input)?,
            None => return Err(url::ParseError::RelativeUrlWithoutBase.into()),
        },
        Err(e) => return Err(e.into()),
    };

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Rejects URLs whose host is localhost or a private network address.
///
/// Hostnames other than `localhost` are not resolved; only literal IP hosts
/// are classified.
///
/// # Examples
///
/// ```
/// use feedfinder::util::ensure_public_host;
/// use url::Url;
///
/// assert!(ensure_public_host(&Url::parse("https://example.com/").unwrap()).is_ok());
/// assert!(ensure_public_host(&Url::parse("http://localhost/").unwrap()).is_err());
/// assert!(ensure_public_host(&Url::parse("http://192.168.1.1/").unwrap()).is_err());
/// ```
pub fn ensure_public_host(url: &Url) -> Result<(), UrlValidationError> {
    let Some(host) = url.host_str() else {
        return Ok(());
    };

    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
