use {
    crate::{Error, Result},
    http::{HeaderMap, HeaderValue, header::COOKIE},
    std::{
        collections::HashMap,
        sync::{Mutex, PoisonError},
        time::Duration,
    },
};

///
/// Request cookies plus the `Set-Cookie` headers queued for the response.
///
/// Every cookie written here is bound to the router base path. Values set
/// during a request are visible to later reads in the same request.
///
#[derive(Debug)]
pub struct Cookie {
    path: String,
    incoming: HashMap<String, String>,
    outgoing: Mutex<Outgoing>,
}

#[derive(Debug, Default)]
struct Outgoing {
    values: HashMap<String, Option<String>>,
    headers: Vec<HeaderValue>,
}

impl Cookie {
    pub(crate) fn new(headers: &HeaderMap, path: String) -> Self {
        let incoming = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self {
            path,
            incoming,
            outgoing: Mutex::default(),
        }
    }

    /// The `Path` attribute applied to written cookies.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let outgoing = self.outgoing.lock().unwrap_or_else(PoisonError::into_inner);
        match outgoing.values.get(name) {
            Some(value) => value.clone(),
            None => self.incoming.get(name).cloned(),
        }
    }

    /// Queues a cookie. Without `max_age` it is a session cookie.
    pub fn set(&self, name: &str, value: &str, max_age: Option<Duration>) -> Result<()> {
        validate("name", name)?;
        validate("value", value)?;
        let mut header = format!(
            "{name}={value}; Path={}; HttpOnly; SameSite=Lax",
            self.path
        );
        if let Some(max_age) = max_age {
            header.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        self.queue(name, Some(value.to_string()), HeaderValue::from_str(&header)?);
        Ok(())
    }

    /// Queues an expired cookie so the client drops it.
    pub fn remove(&self, name: &str) -> Result<()> {
        validate("name", name)?;
        let header = format!("{name}=; Path={}; HttpOnly; SameSite=Lax; Max-Age=0", self.path);
        self.queue(name, None, HeaderValue::from_str(&header)?);
        Ok(())
    }

    fn queue(&self, name: &str, value: Option<String>, header: HeaderValue) {
        let mut outgoing = self.outgoing.lock().unwrap_or_else(PoisonError::into_inner);
        outgoing.values.insert(name.to_string(), value);
        outgoing.headers.push(header);
    }

    pub(crate) fn take_set_cookies(&self) -> Vec<HeaderValue> {
        let mut outgoing = self.outgoing.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut outgoing.headers)
    }
}

fn validate(what: &str, value: &str) -> Result<()> {
    let invalid = |ch: char| ch.is_control() || ch.is_whitespace() || matches!(ch, ';' | ',' | '"');
    if value.contains(invalid) || (what == "name" && (value.is_empty() || value.contains('='))) {
        return Err(Error::invalid_input(format!("invalid cookie {what}: {value:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar(cookie_header: &str) -> Cookie {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie_header).unwrap());
        Cookie::new(&headers, "/api/".into())
    }

    #[test]
    fn test_reads_request_cookies() {
        let cookie = jar("lang=cs; session=abc");
        assert_eq!(cookie.get("lang").as_deref(), Some("cs"));
        assert_eq!(cookie.get("session").as_deref(), Some("abc"));
        assert_eq!(cookie.get("missing"), None);
    }

    #[test]
    fn test_set_is_visible_and_bound_to_path() {
        let cookie = jar("lang=cs");
        cookie
            .set("lang", "en", Some(Duration::from_secs(60)))
            .unwrap();
        assert_eq!(cookie.get("lang").as_deref(), Some("en"));

        let headers = cookie.take_set_cookies();
        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers[0].to_str().unwrap(),
            "lang=en; Path=/api/; HttpOnly; SameSite=Lax; Max-Age=60"
        );
        assert!(cookie.take_set_cookies().is_empty());
    }

    #[test]
    fn test_remove_hides_incoming_value() {
        let cookie = jar("session=abc");
        cookie.remove("session").unwrap();
        assert_eq!(cookie.get("session"), None);
        assert!(
            cookie.take_set_cookies()[0]
                .to_str()
                .unwrap()
                .ends_with("Max-Age=0")
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cookie = jar("");
        assert!(cookie.set("bad name", "x", None).is_err());
        assert!(cookie.set("name", "a;b", None).is_err());
        assert!(cookie.set("", "x", None).is_err());
    }
}
