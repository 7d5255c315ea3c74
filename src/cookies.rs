use axum::http::{HeaderMap, header};

/// Value of the first cookie named `name` in the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub max_age_secs: i64,
    pub http_only: bool,
    pub secure: bool,
}

pub fn build_cookie(name: &str, value: &str, opts: CookieOptions) -> String {
    let mut cookie = format!(
        "{name}={value}; Path=/; Max-Age={}; SameSite=Lax",
        opts.max_age_secs
    );
    if opts.http_only {
        cookie.push_str("; HttpOnly");
    }
    if opts.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expire_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn finds_named_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def; cart=xyz"),
        );
        assert_eq!(read_cookie(&headers, "session").as_deref(), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "cart").as_deref(), Some("xyz"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn builds_and_expires() {
        let cookie = build_cookie(
            "session",
            "tok",
            CookieOptions {
                max_age_secs: 60,
                http_only: true,
                secure: true,
            },
        );
        assert!(cookie.starts_with("session=tok; Path=/; Max-Age=60"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("Secure"));
        assert!(expire_cookie("cart").contains("Max-Age=0"));
    }
}
