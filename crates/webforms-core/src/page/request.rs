//! Incoming request model

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Result, WebFormsError};

// ----------------------------------------------------------------------------
// Hidden Field Names
// ----------------------------------------------------------------------------

/// Page-scope state token
pub const PAGE_STATE_FIELD: &str = "__PAGESTATE";

/// `UniqueID` of the submitted form
pub const FORM_FIELD: &str = "__FORM";

/// State token of the submitted form
pub const FORM_STATE_FIELD: &str = "__FORMSTATE";

/// `UniqueID` of the postback target
pub const EVENT_TARGET_FIELD: &str = "wfcTarget";

/// Argument passed to the postback target
pub const EVENT_ARGUMENT_FIELD: &str = "wfcArgument";

// ----------------------------------------------------------------------------
// Form Values
// ----------------------------------------------------------------------------

/// Submitted name/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormCollection {
    values: BTreeMap<String, String>,
}

impl FormCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormCollection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = FormCollection::new();
        for (name, value) in iter {
            form.insert(name, value);
        }
        form
    }
}

// ----------------------------------------------------------------------------
// Cancellation
// ----------------------------------------------------------------------------

/// Shared flag the host sets when a request is aborted
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ----------------------------------------------------------------------------
// Page Request
// ----------------------------------------------------------------------------

/// HTTP method of the request; only `Post` is a postback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
}

/// What the page pipeline needs from an HTTP request
#[derive(Debug, Clone)]
pub struct PageRequest {
    method: RequestMethod,
    form: FormCollection,
    cancellation: CancellationFlag,
}

impl PageRequest {
    /// Initial request for a page
    pub fn get() -> Self {
        Self {
            method: RequestMethod::Get,
            form: FormCollection::new(),
            cancellation: CancellationFlag::new(),
        }
    }

    /// Postback carrying `form`
    pub fn post(form: FormCollection) -> Self {
        Self {
            method: RequestMethod::Post,
            form,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Observe `flag` between pipeline stages
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn is_post_back(&self) -> bool {
        self.method == RequestMethod::Post
    }

    pub fn form(&self) -> &FormCollection {
        &self.form
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Fail with [`WebFormsError::Cancelled`] once the flag is set
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            Err(WebFormsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_collection_from_pairs() {
        let form: FormCollection = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(form.get("a"), Some("1"));
        assert!(form.contains_key("b"));
        assert_eq!(form.get("c"), None);
    }

    #[test]
    fn test_form_collection_json_shape() {
        let form = FormCollection::new().with(EVENT_TARGET_FIELD, "p$save");
        let json = serde_json::to_string(&form).unwrap();
        assert_eq!(json, "{\"wfcTarget\":\"p$save\"}");
    }

    #[test]
    fn test_cancellation_is_shared() {
        let flag = CancellationFlag::new();
        let request = PageRequest::get().with_cancellation(flag.clone());
        assert!(request.check_cancelled().is_ok());
        flag.cancel();
        assert!(matches!(
            request.check_cancelled(),
            Err(WebFormsError::Cancelled)
        ));
    }
}
