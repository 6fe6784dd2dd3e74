use crate::domain::{Card, Decimal, User};
use thiserror::Error;

/// Outcome of a successful precondition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseQuote {
    pub price: Decimal,
    pub buyer_balance_after: Decimal,
}

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("User not found")]
    BuyerNotFound,
    #[error("Card not found")]
    CardNotFound,
    #[error("Card is not available for purchase")]
    CardNotAvailable,
    #[error("You cannot buy your own card")]
    SelfPurchase,
    #[error("Insufficient ECE balance")]
    InsufficientFunds { required: Decimal, current: Decimal },
    #[error("Card {0} references a missing owner")]
    OwnerMissing(String),
    #[error("Stored value is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Check that `buyer` may purchase `card` from `owner` and price the sale.
///
/// Checks run in a fixed order: availability, self-purchase, funds.
pub fn quote_purchase(buyer: &User, card: &Card, owner: &User) -> Result<PurchaseQuote, PurchaseError> {
    if !card.available_for_buying {
        return Err(PurchaseError::CardNotAvailable);
    }

    if buyer.wallet_address.matches(&owner.wallet_address) || buyer.id == owner.id {
        return Err(PurchaseError::SelfPurchase);
    }

    let price = card.purchase_price();
    if buyer.ece_balance < price {
        return Err(PurchaseError::InsufficientFunds {
            required: price,
            current: buyer.ece_balance,
        });
    }

    Ok(PurchaseQuote {
        price,
        buyer_balance_after: buyer.ece_balance - price,
    })
}
