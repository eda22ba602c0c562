//! # Validation Module
//!
//! Request-shape validation for checkout inputs.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Cart UI                                                      │
//! │  └── Ceiling checks in Cart::add / set_quantity                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: HTTP handler                                                 │
//! │  ├── Deserialization                                                   │
//! │  └── THIS MODULE: shape rules (ids, quantities, email, address)        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Pricing pipeline                                             │
//! │  └── Catalogue, stock and discount rules against live data             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: Database                                                     │
//! │  └── CHECK / UNIQUE constraints, conditional stock decrement           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures here map to HTTP 400 and are shown to the caller verbatim.

use crate::error::ValidationError;
use crate::types::{CheckoutItem, CheckoutPayload, ShippingAddress};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn required<'a>(field: &str, value: &'a str, max: usize) -> ValidationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value)
}

/// Validates a product id reference.
pub fn validate_product_id(product_id: &str) -> ValidationResult<()> {
    required("productId", product_id, 64).map(|_| ())
}

/// Validates a customer email address.
///
/// ## Rules
/// - Required, at most 254 characters
/// - Exactly one `@` with a non-empty local part
/// - Domain contains a dot and no whitespace
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_email;
///
/// assert!(validate_email("ada@example.com").is_ok());
/// assert!(validate_email("ada@localhost").is_err());
/// assert!(validate_email("not-an-email").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = required("customerEmail", email, 254)?;

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "customerEmail".to_string(),
        reason: reason.to_string(),
    };

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing @"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("must be name@domain"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(())
}

/// Validates an ISO 3166-1 alpha-2 country code (`"ES"`, `"us"`).
pub fn validate_country_code(country: &str) -> ValidationResult<()> {
    let country = required("country", country, 2)?;
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "country".to_string(),
            reason: "must be a two-letter ISO country code".to_string(),
        });
    }
    Ok(())
}

/// Validates the format of a discount code before lookup.
///
/// ## Rules
/// - 1 to 32 characters after trimming
/// - Letters, digits, `-` and `_` only
pub fn validate_discount_code(code: &str) -> ValidationResult<()> {
    let code = required("discountCode", code, 32)?;
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "discountCode".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(1000).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates the request lines of a quote or checkout.
pub fn validate_items(items: &[CheckoutItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if items.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }
    for item in items {
        validate_product_id(&item.product_id)?;
        validate_quantity(item.quantity)?;
    }
    Ok(())
}

pub fn validate_shipping_address(address: &ShippingAddress) -> ValidationResult<()> {
    required("fullName", &address.full_name, 200)?;
    required("line1", &address.line1, 200)?;
    required("city", &address.city, 100)?;
    required("postalCode", &address.postal_code, 20)?;
    validate_country_code(&address.country)
}

/// Validates everything a checkout carries before it is priced.
pub fn validate_checkout_payload(payload: &CheckoutPayload) -> ValidationResult<()> {
    validate_items(&payload.items)?;
    validate_shipping_address(&payload.shipping_address)?;
    validate_email(&payload.customer_email)?;
    if let Some(code) = payload.discount_code.as_deref() {
        if !code.trim().is_empty() {
            validate_discount_code(code)?;
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
