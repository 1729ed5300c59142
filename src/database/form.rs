use std::{collections::HashMap, str::FromStr};

use super::error::TypeError;

/// Decoded query string. Keys may repeat (`?tags=lunch&tags=dinner`).
pub struct Form {
    inner: HashMap<String, Vec<String>>,
}

impl Form {
    pub fn from_query(raw: &str) -> Self {
        let mut inner: HashMap<String, Vec<String>> = HashMap::new();
        url::form_urlencoded::parse(raw.as_bytes()).for_each(|(key, value)| {
            inner
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        });

        Self { inner }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .get(key)
            .and_then(|values| values.first())
            .map(|v| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .get(key)
            .map(|values| values.iter().filter(|v| !v.is_empty()).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, TypeError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some("") | None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_e| TypeError::new(&format!("Invalid number for '{key}'"))),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, TypeError> {
        match self.get_str(key) {
            Some("") | None => Ok(None),
            Some("1") | Some("true") | Some("True") => Ok(Some(true)),
            Some("0") | Some("false") | Some("False") => Ok(Some(false)),
            Some(_) => Err(TypeError::new(&format!("Invalid boolean for '{key}'"))),
        }
    }
}
