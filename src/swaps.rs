use crate::models::{Swap, SwapEvent, UnixTime};
use crate::registry::LiveToken;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Applies a swap's effect to a token's price and volume series.
///
/// Called inline by the swap listener, so swaps for one token are applied in
/// the order they were received.
pub trait SwapProcessor: Send + Sync {
    fn apply_swap(&self, token: &LiveToken, swap: &SwapEvent);
}

/// Records the execution price and adds the quote amount to the running volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesSwapProcessor;

impl SwapProcessor for SeriesSwapProcessor {
    fn apply_swap(&self, token: &LiveToken, swap: &SwapEvent) {
        let swap = &swap.data;
        let time: UnixTime = swap
            .block_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        if let Some(price) = swap.price.or_else(|| execution_price(swap)) {
            token.append_price(price, time);
        }

        let traded = swap.quote_amount.abs();
        if traded > 0.0 {
            token.append_volume_delta(traded, time);
        }
    }
}

/// Quote paid per base token, when both legs are known.
fn execution_price(swap: &Swap) -> Option<Decimal> {
    if swap.token_amount == 0.0 || swap.quote_amount == 0.0 {
        return None;
    }
    Decimal::from_f64((swap.quote_amount / swap.token_amount).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Envelope, Token};

    fn swap(token_amount: f64, quote_amount: f64, price: Option<Decimal>, time: i64) -> SwapEvent {
        Envelope {
            kind: Some("swap".into()),
            data: Swap {
                token_address: "TKN".into(),
                signature: None,
                is_buy: true,
                token_amount,
                quote_amount,
                price,
                block_time: Some(time),
            },
        }
    }

    #[test]
    fn swap_appends_price_and_cumulative_volume() {
        let token = LiveToken::from_token(Token::new("TKN"));
        let processor = SeriesSwapProcessor;

        processor.apply_swap(&token, &swap(1_000.0, 2.0, None, 10));
        processor.apply_swap(&token, &swap(500.0, -3.0, None, 20));

        assert_eq!(token.latest_volume(), Some(5.0));
        assert_eq!(token.volume_at_time(15), Some(2.0));
        assert_eq!(token.price_at_time(10), Decimal::from_f64(0.002));
        assert_eq!(token.latest_price(), Decimal::from_f64(0.006));
    }

    #[test]
    fn published_price_wins() {
        let token = LiveToken::from_token(Token::new("TKN"));
        SeriesSwapProcessor.apply_swap(&token, &swap(1.0, 1.0, Some(Decimal::new(42, 0)), 1));
        assert_eq!(token.latest_price(), Some(Decimal::new(42, 0)));
    }

    #[test]
    fn empty_swap_leaves_series_untouched() {
        let token = LiveToken::from_token(Token::new("TKN"));
        SeriesSwapProcessor.apply_swap(&token, &swap(0.0, 0.0, None, 1));

        assert_eq!(token.latest_price(), None);
        assert_eq!(token.latest_volume(), None);
    }
}
