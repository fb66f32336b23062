//! Binance REST API client.
//!
//! One client serves either USDⓈ-M futures or spot, picked by
//! [`MarketKind`]. Both endpoint families are reached through the same
//! signing and decoding helpers.

use crate::config::BinanceConfig;
use crate::exchange::error::{ApiErrorBody, GatewayError};
use crate::exchange::traits::{
    BookTop, ExchangeGateway, ExitPair, ExitTarget, OrderId, OrderState, SymbolInfo,
};
use crate::exchange::types::*;
use crate::strategy::Side;
use crate::utils::decimal::percent_to_basis_points;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, instrument};

const FUTURES_BASE_URL: &str = "https://fapi.binance.com";
const FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";
const SPOT_BASE_URL: &str = "https://api.binance.com";
const SPOT_TESTNET_URL: &str = "https://testnet.binance.vision";

/// Depth levels requested when only the top of book is needed.
const DEPTH_LIMIT: &str = "5";

/// Binance error code for an unknown symbol.
const INVALID_SYMBOL: i64 = -1121;
/// Binance error code for an invalid request parameter.
const INVALID_PARAMETER: i64 = -1130;

/// Binance API client for one market (futures or spot).
pub struct BinanceClient {
    http: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
    market: MarketKind,
    hedge_mode: bool,
}

impl BinanceClient {
    /// Create a new Binance client from configuration.
    pub fn new(config: &BinanceConfig) -> Result<Self> {
        let base_url = match (config.market, config.testnet) {
            (MarketKind::Futures, false) => FUTURES_BASE_URL,
            (MarketKind::Futures, true) => FUTURES_TESTNET_URL,
            (MarketKind::Spot, false) => SPOT_BASE_URL,
            (MarketKind::Spot, true) => SPOT_TESTNET_URL,
        };
        Self::with_base_url(config, base_url)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(config: &BinanceConfig, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            market: config.market,
            hedge_mode: config.hedge_mode,
        })
    }

    pub fn market(&self) -> MarketKind {
        self.market
    }

    /// Generate HMAC-SHA256 signature for authenticated requests.
    fn sign(&self, query_string: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn path(&self, futures: &'static str, spot: &'static str) -> &'static str {
        match self.market {
            MarketKind::Futures => futures,
            MarketKind::Spot => spot,
        }
    }

    fn encode(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(api_error) => api_error.into(),
                Err(_) => GatewayError::Transport(format!("HTTP {}: {}", status, body)),
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = if params.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, Self::encode(params))
        };
        let response = self.http.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, GatewayError> {
        params.push(("timestamp", Self::timestamp().to_string()));
        let query_string = Self::encode(&params);
        let signature = self.sign(&query_string);
        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query_string, signature
        );

        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Hedge-mode futures accounts address each side's position explicitly.
    fn position_side(&self, side: Side) -> Option<PositionSide> {
        match (self.market, self.hedge_mode) {
            (MarketKind::Futures, true) => Some(side.position_side()),
            _ => None,
        }
    }

    async fn submit(&self, order: NewOrder) -> Result<OrderId, GatewayError> {
        debug!(?order, "Placing order");
        let path = self.path("/fapi/v1/order", "/api/v3/order");
        let response: OrderResponse = self.signed(Method::POST, path, order.to_params()).await?;
        Ok(response.order_id)
    }

    /// Spot expresses the trailing distance in basis points.
    fn trailing_delta(callback_rate_percent: Decimal) -> Result<u32, GatewayError> {
        percent_to_basis_points(callback_rate_percent)
            .round()
            .to_u32()
            .filter(|bips| *bips > 0)
            .ok_or_else(|| {
                GatewayError::api(
                    INVALID_PARAMETER,
                    format!("trailing delta out of range: {}%", callback_rate_percent),
                )
            })
    }

    /// Protective trigger order closing the side's position.
    fn protective_order(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        quantity: Decimal,
        close_whole_position: bool,
        futures_type: OrderType,
        spot_type: OrderType,
    ) -> NewOrder {
        match self.market {
            MarketKind::Futures => {
                let order = NewOrder::new(symbol, side.exit_order_side(), futures_type)
                    .with_position_side(self.position_side(side))
                    .with_stop_price(stop_price);
                if close_whole_position {
                    order.with_close_position()
                } else {
                    order.with_quantity(quantity)
                }
            }
            MarketKind::Spot => NewOrder::new(symbol, side.exit_order_side(), spot_type)
                .with_stop_price(stop_price)
                .with_quantity(quantity),
        }
    }
}

#[async_trait]
impl ExchangeGateway for BinanceClient {
    #[instrument(skip(self))]
    async fn get_reference_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        let params = [("symbol", symbol.to_string())];
        match self.market {
            MarketKind::Futures => {
                let mark: MarkPrice = self.public_get("/fapi/v1/premiumIndex", &params).await?;
                Ok(mark.mark_price)
            }
            MarketKind::Spot => {
                let ticker: TickerPrice = self.public_get("/api/v3/ticker/price", &params).await?;
                Ok(ticker.price)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_order_book_top(&self, symbol: &str) -> Result<BookTop, GatewayError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("limit", DEPTH_LIMIT.to_string()),
        ];
        let path = self.path("/fapi/v1/depth", "/api/v3/depth");
        let depth: OrderBookDepth = self.public_get(path, &params).await?;

        match (depth.bids.first(), depth.asks.first()) {
            (Some((bid, _)), Some((ask, _))) => Ok(BookTop {
                best_bid: *bid,
                best_ask: *ask,
            }),
            _ => Err(GatewayError::Decode(format!(
                "empty order book for {}",
                symbol
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn get_fee_rate(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        let params = vec![("symbol", symbol.to_string())];
        match self.market {
            MarketKind::Futures => {
                let rate: CommissionRate = self
                    .signed(Method::GET, "/fapi/v1/commissionRate", params)
                    .await?;
                Ok(rate.maker_commission_rate)
            }
            MarketKind::Spot => {
                let fees: Vec<SpotTradeFee> = self
                    .signed(Method::GET, "/sapi/v1/asset/tradeFee", params)
                    .await?;
                fees.into_iter()
                    .find(|fee| fee.symbol == symbol)
                    .map(|fee| fee.maker_commission)
                    .ok_or_else(|| GatewayError::Decode(format!("no trade fee for {}", symbol)))
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_balance(&self, asset: &str) -> Result<Decimal, GatewayError> {
        let balance = match self.market {
            MarketKind::Futures => {
                let balances: Vec<FuturesBalance> =
                    self.signed(Method::GET, "/fapi/v2/balance", vec![]).await?;
                balances
                    .into_iter()
                    .find(|b| b.asset == asset)
                    .map(|b| b.balance)
            }
            MarketKind::Spot => {
                let account: SpotAccount =
                    self.signed(Method::GET, "/api/v3/account", vec![]).await?;
                account
                    .balances
                    .into_iter()
                    .find(|b| b.asset == asset)
                    .map(|b| b.free)
            }
        };

        Ok(balance.unwrap_or(Decimal::ZERO))
    }

    #[instrument(skip(self))]
    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, GatewayError> {
        let info: ExchangeInfo = match self.market {
            MarketKind::Futures => self.public_get("/fapi/v1/exchangeInfo", &[]).await?,
            MarketKind::Spot => {
                self.public_get("/api/v3/exchangeInfo", &[("symbol", symbol.to_string())])
                    .await?
            }
        };

        info.symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .map(|s| SymbolInfo {
                symbol: s.symbol,
                quote_asset: s.quote_asset,
                quantity_precision: s.quantity_precision,
                price_precision: s.price_precision,
            })
            .ok_or_else(|| GatewayError::api(INVALID_SYMBOL, format!("Invalid symbol {}", symbol)))
    }

    #[instrument(skip(self))]
    async fn place_entry_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderId, GatewayError> {
        let order = NewOrder::new(symbol, side.entry_order_side(), OrderType::Limit)
            .with_position_side(self.position_side(side))
            .with_quantity(quantity)
            .with_price(price)
            .with_time_in_force(TimeInForce::Gtc);
        self.submit(order).await
    }

    #[instrument(skip(self))]
    async fn place_take_profit_order(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        quantity: Decimal,
        close_whole_position: bool,
    ) -> Result<OrderId, GatewayError> {
        let order = self.protective_order(
            symbol,
            side,
            stop_price,
            quantity,
            close_whole_position,
            OrderType::TakeProfitMarket,
            OrderType::TakeProfit,
        );
        self.submit(order).await
    }

    #[instrument(skip(self))]
    async fn place_trailing_stop_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        activation_price: Decimal,
        callback_rate_percent: Decimal,
    ) -> Result<OrderId, GatewayError> {
        let order = match self.market {
            MarketKind::Futures => {
                NewOrder::new(symbol, side.exit_order_side(), OrderType::TrailingStopMarket)
                    .with_position_side(self.position_side(side))
                    .with_quantity(quantity)
                    .with_trailing(activation_price, callback_rate_percent)
            }
            MarketKind::Spot => {
                NewOrder::new(symbol, side.exit_order_side(), OrderType::TakeProfit)
                    .with_quantity(quantity)
                    .with_stop_price(activation_price)
                    .with_trailing_delta(Self::trailing_delta(callback_rate_percent)?)
            }
        };
        self.submit(order).await
    }

    #[instrument(skip(self))]
    async fn place_stop_loss_order(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        quantity: Decimal,
        close_whole_position: bool,
    ) -> Result<OrderId, GatewayError> {
        let order = self.protective_order(
            symbol,
            side,
            stop_price,
            quantity,
            close_whole_position,
            OrderType::StopMarket,
            OrderType::StopLoss,
        );
        self.submit(order).await
    }

    #[instrument(skip(self))]
    async fn place_exit_pair(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        target: ExitTarget,
        stop_price: Decimal,
    ) -> Result<ExitPair, GatewayError> {
        if self.market != MarketKind::Spot {
            return Err(GatewayError::Unsupported(
                "order lists are spot only".to_string(),
            ));
        }

        let target_leg = ListLeg {
            order_type: OrderType::TakeProfit,
            stop_price: target.trigger(),
            trailing_delta: target
                .callback_rate()
                .map(Self::trailing_delta)
                .transpose()?,
        };
        let stop_leg = ListLeg {
            order_type: OrderType::StopLoss,
            stop_price,
            trailing_delta: None,
        };
        let list = NewOrderList::new(symbol, side.exit_order_side(), quantity, target_leg, stop_leg);
        debug!(?list, "Placing exit order list");

        let response: OrderListResponse = self
            .signed(Method::POST, "/api/v3/orderList/oco", list.to_params())
            .await?;
        match (
            response.order_id_of(OrderType::TakeProfit),
            response.order_id_of(OrderType::StopLoss),
        ) {
            (Some(target), Some(stop)) => Ok(ExitPair { target, stop }),
            _ => Err(GatewayError::Decode(format!(
                "order list {} is missing its take-profit or stop-loss report",
                response.order_list_id
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: OrderId,
    ) -> Result<OrderState, GatewayError> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let path = self.path("/fapi/v1/order", "/api/v3/order");
        let response: OrderResponse = self.signed(Method::GET, path, params).await?;

        Ok(OrderState {
            order_id: response.order_id,
            status: response.status,
            fill_price: response.fill_price(),
            executed_qty: response.executed_qty.filter(|q| !q.is_zero()),
        })
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, symbol: &str, order_id: OrderId) -> Result<(), GatewayError> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let path = self.path("/fapi/v1/order", "/api/v3/order");
        let _: OrderResponse = self.signed(Method::DELETE, path, params).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cancel_all_open_orders(&self, symbol: &str) -> Result<(), GatewayError> {
        let params = vec![("symbol", symbol.to_string())];
        let path = self.path("/fapi/v1/allOpenOrders", "/api/v3/openOrders");
        let _: serde_json::Value = self.signed(Method::DELETE, path, params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(market: MarketKind) -> BinanceConfig {
        BinanceConfig {
            api_key: "test-key".to_string(),
            secret_key: "test-secret".to_string(),
            testnet: true,
            market,
            hedge_mode: true,
        }
    }

    async fn client_for(server: &MockServer, market: MarketKind) -> BinanceClient {
        BinanceClient::with_base_url(&test_config(market), &server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_futures_entry_order_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fapi/v1/order"))
            .and(header("X-MBX-APIKEY", "test-key"))
            .and(query_param("symbol", "BTCUSDT"))
            .and(query_param("side", "SELL"))
            .and(query_param("type", "LIMIT"))
            .and(query_param("positionSide", "SHORT"))
            .and(query_param("timeInForce", "GTC"))
            .and(query_param("quantity", "0.002"))
            .and(query_param("price", "50000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "orderId": 4242,
                "symbol": "BTCUSDT",
                "status": "NEW",
                "price": "50000",
                "origQty": "0.002",
                "executedQty": "0"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, MarketKind::Futures).await;
        let id = client
            .place_entry_order("BTCUSDT", Side::Short, dec!(0.002), dec!(50000))
            .await
            .unwrap();
        assert_eq!(id, 4242);
    }

    #[tokio::test]
    async fn test_futures_stop_loss_closes_position() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fapi/v1/order"))
            .and(query_param("side", "SELL"))
            .and(query_param("type", "STOP_MARKET"))
            .and(query_param("positionSide", "LONG"))
            .and(query_param("stopPrice", "49900"))
            .and(query_param("closePosition", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "orderId": 7,
                "symbol": "BTCUSDT",
                "status": "NEW"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, MarketKind::Futures).await;
        let id = client
            .place_stop_loss_order("BTCUSDT", Side::Long, dec!(49900), dec!(0.002), true)
            .await
            .unwrap();
        assert_eq!(id, 7);
    }

    #[tokio::test]
    async fn test_api_error_body_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fapi/v1/order"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": -2021,
                "msg": "Order would immediately trigger."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, MarketKind::Futures).await;
        let err = client
            .place_take_profit_order("BTCUSDT", Side::Long, dec!(50200), dec!(0.002), true)
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(-2021));
        assert_eq!(
            err.kind(),
            crate::exchange::ApiErrorKind::TriggerWouldFireImmediately
        );
    }

    #[tokio::test]
    async fn test_spot_trailing_uses_basis_points() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/order"))
            .and(query_param("side", "SELL"))
            .and(query_param("type", "TAKE_PROFIT"))
            .and(query_param("trailingDelta", "150"))
            .and(query_param("stopPrice", "50500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "orderId": 11,
                "symbol": "BTCUSDT",
                "status": "NEW"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, MarketKind::Spot).await;
        let id = client
            .place_trailing_stop_order("BTCUSDT", Side::Long, dec!(0.002), dec!(50500), dec!(1.5))
            .await
            .unwrap();
        assert_eq!(id, 11);
    }

    #[tokio::test]
    async fn test_spot_exit_pair_is_one_order_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/orderList/oco"))
            .and(query_param("side", "BUY"))
            .and(query_param("quantity", "0.002"))
            .and(query_param("aboveType", "STOP_LOSS"))
            .and(query_param("aboveStopPrice", "50100"))
            .and(query_param("belowType", "TAKE_PROFIT"))
            .and(query_param("belowStopPrice", "49800"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "orderListId": 901,
                "contingencyType": "OCO",
                "symbol": "BTCUSDT",
                "orderReports": [
                    {"symbol": "BTCUSDT", "orderId": 21, "type": "STOP_LOSS", "status": "NEW"},
                    {"symbol": "BTCUSDT", "orderId": 22, "type": "TAKE_PROFIT", "status": "NEW"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, MarketKind::Spot).await;
        let target = ExitTarget::TakeProfit {
            stop_price: dec!(49800),
        };
        let pair = client
            .place_exit_pair("BTCUSDT", Side::Short, dec!(0.002), target, dec!(50100))
            .await
            .unwrap();

        assert_eq!(pair, ExitPair { target: 22, stop: 21 });
    }

    #[tokio::test]
    async fn test_futures_has_no_exit_pairs() {
        let server = MockServer::start().await;
        let client = client_for(&server, MarketKind::Futures).await;
        let target = ExitTarget::TakeProfit {
            stop_price: dec!(50200),
        };

        let err = client
            .place_exit_pair("BTCUSDT", Side::Long, dec!(0.002), target, dec!(49900))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Unsupported(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_reference_price_per_market() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/premiumIndex"))
            .and(query_param("symbol", "BTCUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "BTCUSDT",
                "markPrice": "50000.12"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "BTCUSDT",
                "price": "49999.50"
            })))
            .mount(&server)
            .await;

        let futures = client_for(&server, MarketKind::Futures).await;
        let spot = client_for(&server, MarketKind::Spot).await;
        assert_eq!(futures.get_reference_price("BTCUSDT").await.unwrap(), dec!(50000.12));
        assert_eq!(spot.get_reference_price("BTCUSDT").await.unwrap(), dec!(49999.50));
    }

    #[tokio::test]
    async fn test_missing_balance_asset_is_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fapi/v2/balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"asset": "BNB", "balance": "1.5", "availableBalance": "1.5"}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server, MarketKind::Futures).await;
        assert_eq!(client.get_balance("BNB").await.unwrap(), dec!(1.5));
        assert_eq!(client.get_balance("USDT").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_symbol_info_resolves_quote_asset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/exchangeInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbols": [
                    {"symbol": "ETHUSDT", "baseAsset": "ETH", "quoteAsset": "USDT",
                     "pricePrecision": 2, "quantityPrecision": 3},
                    {"symbol": "BTCUSDC", "baseAsset": "BTC", "quoteAsset": "USDC",
                     "pricePrecision": 1, "quantityPrecision": 3}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, MarketKind::Futures).await;
        let info = client.get_symbol_info("BTCUSDC").await.unwrap();
        assert_eq!(info.quote_asset, "USDC");
        assert_eq!(info.price_precision, Some(1));

        let err = client.get_symbol_info("DOGEUSDT").await.unwrap_err();
        assert_eq!(err.code(), Some(INVALID_SYMBOL));
    }

    #[tokio::test]
    async fn test_order_status_reports_fill() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/order"))
            .and(query_param("orderId", "99"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "orderId": 99,
                "symbol": "BTCUSDT",
                "status": "FILLED",
                "avgPrice": "49900.0",
                "executedQty": "0.002"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, MarketKind::Futures).await;
        let state = client.get_order_status("BTCUSDT", 99).await.unwrap();
        assert_eq!(state.status, OrderStatus::Filled);
        assert_eq!(state.fill_price, Some(dec!(49900.0)));
        assert_eq!(state.executed_qty, Some(dec!(0.002)));
    }
}
