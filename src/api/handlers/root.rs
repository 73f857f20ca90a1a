use axum::response::IntoResponse;

// Undocumented on purpose: `/` only confirms the service is up.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, response::IntoResponse};

    #[tokio::test]
    async fn root_reports_name_and_version() {
        let response = root().await.into_response();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with(env!("CARGO_PKG_NAME")));
        assert!(body.contains(env!("CARGO_PKG_VERSION")));
    }
}
