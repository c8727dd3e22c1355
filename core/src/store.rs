//! Service objects for the demo store.
//!
//! # Design
//! `StoreEndpoints` holds only a `base_url` and maps each store operation to
//! a `RequestSpec`. It never executes anything and keeps no session: callers
//! pass the token they got from `login` into every authenticated call.

use crate::http::RequestSpec;

#[derive(Debug, Clone)]
pub struct StoreEndpoints {
    base_url: String,
}

impl StoreEndpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn health(&self) -> RequestSpec {
        RequestSpec::get(self.url("/health"))
    }

    pub fn list_products(&self) -> RequestSpec {
        RequestSpec::get(self.url("/products"))
    }

    pub fn products_in(&self, category: &str) -> RequestSpec {
        self.list_products().with_query("category", category)
    }

    pub fn product(&self, id: u32) -> RequestSpec {
        RequestSpec::get(self.url(&format!("/products/{id}")))
    }

    pub fn product_page(&self, id: u32) -> RequestSpec {
        RequestSpec::get(self.url(&format!("/products/{id}/page")))
    }

    pub fn search(&self, query: &str) -> RequestSpec {
        RequestSpec::get(self.url("/search")).with_query("q", query)
    }

    pub fn login(&self, email: &str, password: &str) -> RequestSpec {
        RequestSpec::post(self.url("/auth/login"))
            .with_form(&[("email", email), ("password", password)])
    }

    pub fn logout(&self, token: &str) -> RequestSpec {
        RequestSpec::post(self.url("/auth/logout")).with_bearer(token)
    }

    pub fn add_to_cart(&self, token: &str, product_id: u32, quantity: u32) -> RequestSpec {
        RequestSpec::post(self.url("/cart/add"))
            .with_bearer(token)
            .with_form(&[
                ("product_id", product_id.to_string()),
                ("quantity", quantity.to_string()),
            ])
    }

    pub fn view_cart(&self, token: &str) -> RequestSpec {
        RequestSpec::get(self.url("/cart")).with_bearer(token)
    }

    pub fn clear_cart(&self, token: &str) -> RequestSpec {
        RequestSpec::delete(self.url("/cart")).with_bearer(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, FORM_CONTENT_TYPE};

    fn store() -> StoreEndpoints {
        StoreEndpoints::new("http://localhost:3000")
    }

    #[test]
    fn list_products_produces_correct_request() {
        let req = store().list_products();
        assert_eq!(req.method(), HttpMethod::Get);
        assert_eq!(req.target(), "http://localhost:3000/products");
        assert!(req.body().is_none());
        assert!(req.headers().is_empty());
    }

    #[test]
    fn products_in_adds_category_filter() {
        let url = store().products_in("laptops").resolve_url(None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/products?category=laptops");
    }

    #[test]
    fn product_uses_id_in_path() {
        assert_eq!(store().product(7).target(), "http://localhost:3000/products/7");
        assert_eq!(store().product_page(7).target(), "http://localhost:3000/products/7/page");
    }

    #[test]
    fn login_is_form_encoded() {
        let req = store().login("shopper@example.com", "s3cret!");
        assert_eq!(req.method(), HttpMethod::Post);
        assert_eq!(req.target(), "http://localhost:3000/auth/login");
        assert_eq!(req.headers()["content-type"], FORM_CONTENT_TYPE);
        assert_eq!(
            req.body().unwrap().as_ref(),
            b"email=shopper%40example.com&password=s3cret%21"
        );
    }

    #[test]
    fn add_to_cart_threads_session_token() {
        let req = store().add_to_cart("tok-1", 3, 2);
        assert_eq!(req.method(), HttpMethod::Post);
        assert_eq!(req.headers()["authorization"], "Bearer tok-1");
        assert_eq!(req.body().unwrap().as_ref(), b"product_id=3&quantity=2");
    }

    #[test]
    fn cart_operations_use_the_same_path() {
        let view = store().view_cart("t");
        let clear = store().clear_cart("t");
        assert_eq!(view.method(), HttpMethod::Get);
        assert_eq!(clear.method(), HttpMethod::Delete);
        assert_eq!(view.target(), clear.target());
    }

    #[test]
    fn search_encodes_query() {
        let url = store().search("usb c").resolve_url(None).unwrap();
        assert_eq!(url.query(), Some("q=usb+c"));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let store = StoreEndpoints::new("http://localhost:3000/");
        assert_eq!(store.list_products().target(), "http://localhost:3000/products");
    }
}
