//! Client for the remote pizza factory that fulfils placed orders.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::auth::Principal;
use crate::config::FactorySection;
use crate::store::{Order, UserId};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("factory unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("factory rejected order with status {status}")]
    Rejected {
        status: u16,
        report_url: Option<String>,
    },
}

/// What the factory hands back for a fulfilled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryReceipt {
    /// Signed proof of the order, issued by the factory.
    pub jwt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
}

#[async_trait]
pub trait PizzaFactory: Send + Sync {
    async fn make_pizzas(&self, diner: &Principal, order: &Order) -> Result<FactoryReceipt, FactoryError>;
}

#[derive(Serialize)]
struct FactoryRequest<'a> {
    diner: Diner<'a>,
    order: &'a Order,
}

#[derive(Serialize)]
struct Diner<'a> {
    id: UserId,
    name: &'a str,
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FactoryFailure {
    #[serde(default)]
    report_url: Option<String>,
}

pub struct HttpFactory {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpFactory {
    pub fn new(config: &FactorySection) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "factory client build failed, calling without a timeout");
                reqwest::Client::new()
            });

        Self {
            http,
            url: format!("{}/api/order", config.url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl PizzaFactory for HttpFactory {
    async fn make_pizzas(&self, diner: &Principal, order: &Order) -> Result<FactoryReceipt, FactoryError> {
        let body = FactoryRequest {
            diner: Diner {
                id: diner.user_id,
                name: &diner.name,
                email: &diner.email,
            },
            order,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        // the factory may still point at a failure report
        let report_url = response
            .json::<FactoryFailure>()
            .await
            .ok()
            .and_then(|f| f.report_url);
        Err(FactoryError::Rejected {
            status: status.as_u16(),
            report_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, RoleGrant};
    use crate::store::OrderItem;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use serde_json::{json, Value};

    async fn factory_stub(status: StatusCode) -> String {
        let app = Router::new().route(
            "/api/order",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                let authorized = headers.get("authorization").and_then(|v| v.to_str().ok())
                    == Some("Bearer factory-key");
                if !authorized {
                    return (StatusCode::UNAUTHORIZED, Json(json!({})));
                }
                if !status.is_success() {
                    return (status, Json(json!({ "reportUrl": "http://factory/report/1" })));
                }
                let diner = body["diner"]["email"].as_str().unwrap_or_default().to_owned();
                (status, Json(json!({ "jwt": format!("made-for-{diner}"), "reportUrl": null })))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn factory(url: String) -> HttpFactory {
        HttpFactory::new(&FactorySection {
            url,
            api_key: "factory-key".into(),
        })
    }

    fn diner() -> Principal {
        Principal {
            user_id: 3,
            name: "pizza diner".into(),
            email: "d@jwt.com".into(),
            roles: vec![RoleGrant::global(Role::Diner)],
        }
    }

    fn order() -> Order {
        Order {
            id: 1,
            diner_id: 3,
            franchise_id: 1,
            store_id: 2,
            date: Utc::now(),
            items: vec![OrderItem {
                menu_id: 1,
                description: "Veggie".into(),
                price: 0.05,
            }],
        }
    }

    #[tokio::test]
    async fn successful_order_returns_receipt() {
        let url = factory_stub(StatusCode::OK).await;
        let receipt = factory(url).make_pizzas(&diner(), &order()).await.unwrap();
        assert_eq!(receipt.jwt, "made-for-d@jwt.com");
        assert!(receipt.report_url.is_none());
    }

    #[tokio::test]
    async fn rejected_order_keeps_report_url() {
        let url = factory_stub(StatusCode::INTERNAL_SERVER_ERROR).await;
        let err = factory(url).make_pizzas(&diner(), &order()).await.unwrap_err();
        match err {
            FactoryError::Rejected { status, report_url } => {
                assert_eq!(status, 500);
                assert_eq!(report_url.as_deref(), Some("http://factory/report/1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_factory_is_a_transport_error() {
        let err = factory("http://127.0.0.1:9".into())
            .make_pizzas(&diner(), &order())
            .await
            .unwrap_err();
        assert!(matches!(err, FactoryError::Transport(_)));
    }
}
