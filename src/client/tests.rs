// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::client::{
        ClientError, ClientResponse, HttpMethod, InvocationContext, InvocationError,
    };
    use bytes::Bytes;
    use reqwest::header::HeaderMap;

    #[test]
    fn test_http_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
        assert_eq!(HttpMethod::Put.to_string(), "PUT");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert_eq!(HttpMethod::Head.to_string(), "HEAD");
        assert_eq!(HttpMethod::Options.to_string(), "OPTIONS");
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }

    #[test]
    fn test_http_method_into_reqwest() {
        assert_eq!(reqwest::Method::from(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(
            reqwest::Method::from(HttpMethod::Patch),
            reqwest::Method::PATCH
        );
        assert_eq!(
            reqwest::Method::from(HttpMethod::Delete),
            reqwest::Method::DELETE
        );
    }

    #[test]
    fn test_invocation_context_attributes() {
        let mut context = InvocationContext::new();

        context
            .attributes
            .insert("key1".to_string(), serde_json::json!("value1"));
        context
            .attributes
            .insert("key2".to_string(), serde_json::json!(42));

        assert_eq!(
            context.attributes.get("key1").unwrap(),
            &serde_json::json!("value1")
        );
        assert_eq!(
            context.attributes.get("key2").unwrap(),
            &serde_json::json!(42)
        );
        assert!(context.start_time.is_some());
    }

    #[test]
    fn test_invocation_context_ids_are_unique() {
        let a = InvocationContext::new();
        let b = InvocationContext::new();
        assert_ne!(a.invocation_id, b.invocation_id);
    }

    #[test]
    fn test_response_success_ranges() {
        let response = |status| ClientResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(response(302).is_success());
        assert!(!response(199).is_success());
        assert!(!response(400).is_success());
        assert!(!response(503).is_success());
    }

    #[test]
    fn test_response_text_and_json() {
        let response = ClientResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"{\"name\":\"ferris\"}"),
        };

        assert_eq!(response.text(), "{\"name\":\"ferris\"}");

        #[derive(serde::Deserialize)]
        struct Named {
            name: String,
        }
        let named: Named = response.json().unwrap();
        assert_eq!(named.name, "ferris");

        // The buffered body can be decoded again.
        let again: serde_json::Value = response.json().unwrap();
        assert_eq!(again["name"], "ferris");
    }

    #[test]
    fn test_response_json_decode_failure() {
        let response = ClientResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"not json"),
        };

        let result: Result<serde_json::Value, ClientError> = response.json();
        match result {
            Err(ClientError::Other(msg)) => assert!(msg.contains("decode")),
            other => panic!("expected Other error, got {other:?}"),
        }
    }

    #[test]
    fn test_invocation_error_display() {
        let plain = InvocationError::new(ClientError::Definition("no verb".to_string()));
        assert_eq!(plain.to_string(), "client definition error: no verb");

        let mut with_suppressed =
            InvocationError::new(ClientError::Interceptor("remove failed".to_string()));
        with_suppressed.suppress(ClientError::Interceptor("second remove failed".to_string()));
        assert!(with_suppressed.to_string().contains("1 suppressed"));
        assert_eq!(with_suppressed.suppressed.len(), 1);
    }

    #[test]
    fn test_invocation_error_from_client_error() {
        let err: InvocationError = ClientError::Other("boom".to_string()).into();
        assert!(err.suppressed.is_empty());
        assert_eq!(err.primary.to_string(), "boom");
    }

    #[test]
    fn test_invocation_error_source() {
        use std::error::Error;
        let err = InvocationError::new(ClientError::Config("missing".to_string()));
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "configuration error: missing");
    }
}
