use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::RazorpayConfig,
    data_objects::{NewRazorpayOrder, NewRefund, RazorpayOrder, RazorpayRefund},
    RazorpayApiError,
};

#[derive(Clone)]
pub struct RazorpayApi {
    config: RazorpayConfig,
    client: Arc<Client>,
}

impl RazorpayApi {
    pub fn new(config: RazorpayConfig) -> Result<Self, RazorpayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| RazorpayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn key_id(&self) -> &str {
        self.config.key_id.as_str()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, RazorpayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self
            .client
            .request(method, url)
            .basic_auth(self.config.key_id.as_str(), Some(self.config.key_secret.reveal()));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| RazorpayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(RazorpayApiError::QueryError { status, message })
        }
    }

    pub async fn create_order(&self, order: NewRazorpayOrder) -> Result<RazorpayOrder, RazorpayApiError> {
        debug!("Creating provider order for {} {} ({})", order.amount, order.currency, order.receipt);
        let result = self.rest_query::<RazorpayOrder, _>(Method::POST, "/orders", Some(order)).await?;
        info!("Created provider order {}", result.id);
        Ok(result)
    }

    pub async fn fetch_order(&self, order_id: &str) -> Result<RazorpayOrder, RazorpayApiError> {
        let path = format!("/orders/{order_id}");
        debug!("Fetching provider order {order_id}");
        self.rest_query::<RazorpayOrder, ()>(Method::GET, &path, None).await
    }

    pub async fn refund_payment(&self, payment_id: &str, amount: i64) -> Result<RazorpayRefund, RazorpayApiError> {
        let path = format!("/payments/{payment_id}/refund");
        debug!("Requesting refund of {amount} for payment {payment_id}");
        let body = NewRefund { amount, notes: None };
        let result = self.rest_query::<RazorpayRefund, _>(Method::POST, &path, Some(body)).await?;
        info!("Refund {} for payment {payment_id} is {}", result.id, result.status);
        Ok(result)
    }
}
