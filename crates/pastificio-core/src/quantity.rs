//! # Quantities
//!
//! Stock and line quantities are real numbers: fresh pasta is sold by weight,
//! sauces by volume, filled pasta by the box. Products measured in `Unit` or
//! `Box` only accept whole quantities.
//!
//! `QUANTITY_EPSILON` only decides whether a quantity counts as whole. Stock
//! coverage is an exact comparison, and currency rounding is done on integer
//! cents in [`crate::money`].

use crate::error::{CoreError, CoreResult};
use crate::types::UnitOfMeasure;

/// Integrality tolerance for `Unit` and `Box` quantities.
pub const QUANTITY_EPSILON: f64 = 1e-6;

/// Returns true when `quantity` is a whole number within [`QUANTITY_EPSILON`].
///
/// ## Example
/// ```rust
/// use pastificio_core::quantity::is_integral;
///
/// assert!(is_integral(3.0));
/// assert!(is_integral(2.9999999));
/// assert!(!is_integral(2.5));
/// ```
pub fn is_integral(quantity: f64) -> bool {
    (quantity - quantity.round()).abs() <= QUANTITY_EPSILON
}

/// Snaps a validated quantity to a whole number for `Unit` and `Box`
/// products, so the amount taken from stock is exactly the amount recorded.
///
/// ## Example
/// ```rust
/// use pastificio_core::quantity::normalize_for;
/// use pastificio_core::UnitOfMeasure;
///
/// assert_eq!(normalize_for(UnitOfMeasure::Box, 2.0000004), 2.0);
/// assert_eq!(normalize_for(UnitOfMeasure::Weight, 0.3500004), 0.3500004);
/// ```
pub fn normalize_for(measure: UnitOfMeasure, quantity: f64) -> f64 {
    if measure.requires_integral_quantity() {
        quantity.round()
    } else {
        quantity
    }
}

/// Checks that a line quantity is finite and strictly positive.
pub fn ensure_positive(product_id: &str, quantity: f64) -> CoreResult<()> {
    if !quantity.is_finite() {
        return Err(CoreError::invalid_quantity(
            product_id,
            quantity,
            "quantity must be a finite number",
        ));
    }

    if quantity <= 0.0 {
        return Err(CoreError::invalid_quantity(
            product_id,
            quantity,
            "quantity must be greater than zero",
        ));
    }

    Ok(())
}

/// Checks a positive quantity against the product's unit of measure.
///
/// `Unit` and `Box` products reject fractional quantities; weight and volume
/// accept any positive amount.
pub fn ensure_valid_for(product_id: &str, measure: UnitOfMeasure, quantity: f64) -> CoreResult<()> {
    ensure_positive(product_id, quantity)?;

    if measure.requires_integral_quantity() && !is_integral(quantity) {
        return Err(CoreError::invalid_quantity(
            product_id,
            quantity,
            format!("{} products are sold in whole quantities", measure),
        ));
    }

    Ok(())
}
