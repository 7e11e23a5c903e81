//! One-shot messages carried across a redirect in the `rr_flash` cookie.

use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rr_ui::Flash;

pub const FLASH_COOKIE: &str = "rr_flash";

pub fn success(message: impl Into<String>) -> Flash {
    Flash {
        level: "success".into(),
        message: message.into(),
    }
}

pub fn error(message: impl Into<String>) -> Flash {
    Flash {
        level: "error".into(),
        message: message.into(),
    }
}

fn encode(flashes: &[Flash]) -> String {
    let pairs: Vec<(&str, &str)> = flashes
        .iter()
        .map(|f| (f.level.as_str(), f.message.as_str()))
        .collect();
    let json = serde_json::to_vec(&pairs).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode(value: &str) -> Vec<Flash> {
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(value) else {
        return Vec::new();
    };
    let pairs: Vec<(String, String)> = serde_json::from_slice(&bytes).unwrap_or_default();
    pairs
        .into_iter()
        .map(|(level, message)| Flash { level, message })
        .collect()
}

/// Reads pending messages. Pair with [`clear_if_shown`] so they are shown once.
pub fn take(req: &HttpRequest) -> Vec<Flash> {
    req.cookie(FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default()
}

fn cookie(value: String) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
}

/// Clears the flash cookie when messages were consumed by this render.
pub fn clear_if_shown(builder: &mut HttpResponseBuilder, shown: bool) {
    if shown {
        let mut removal = cookie(String::new());
        removal.make_removal();
        builder.cookie(removal);
    }
}

/// 303 to `location`, queueing `flash` for the next page.
pub fn redirect(location: &str, flash: Flash) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.to_string()))
        .cookie(cookie(encode(&[flash])))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn round_trips_through_the_cookie() {
        let value = encode(&[success("Incident deleted."), error("Nope; \"quoted\"")]);
        assert!(!value.contains(';'));
        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, value))
            .to_http_request();
        let flashes = take(&req);
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].level, "success");
        assert_eq!(flashes[1].message, "Nope; \"quoted\"");
    }

    #[test]
    fn garbage_cookie_yields_nothing() {
        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, "%%%"))
            .to_http_request();
        assert!(take(&req).is_empty());
    }
}
