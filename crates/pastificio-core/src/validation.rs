//! # Input Validation
//!
//! Checks shared by sale and order requests, run before any store access.
//!
//! ## Line Merging
//! ```text
//! request:  [fusilli 2] [ravioli 1] [fusilli 1.5]
//!                │            │           │
//!                └──── merged by product id ┘
//!                             ▼
//! merged:   [fusilli 3.5] [ravioli 1]      (first-seen order kept)
//! ```
//! Quantities are checked per submitted line, so `[fusilli 2] [fusilli -1]`
//! fails instead of silently merging to 1.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::quantity::ensure_positive;
use crate::types::LineRequest;

/// Maximum length of free-text notes.
pub const MAX_NOTES_LEN: usize = 500;

/// Maximum length of an order's client name.
pub const MAX_CLIENT_LEN: usize = 120;

/// Merges duplicate product lines and checks every quantity.
///
/// ## Errors
/// * `EmptyItems` - no lines at all
/// * `Validation(Required)` - a line without product id
/// * `InvalidQuantity` - zero, negative or non-finite quantity
/// * `Validation(OutOfRange)` - more than `max_lines` distinct products
pub fn merge_lines(lines: &[LineRequest], max_lines: usize) -> CoreResult<Vec<LineRequest>> {
    if lines.is_empty() {
        return Err(CoreError::EmptyItems);
    }

    let mut merged: Vec<LineRequest> = Vec::with_capacity(lines.len());
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(lines.len());

    for line in lines {
        let product_id = line.product_id.trim();
        if product_id.is_empty() {
            return Err(ValidationError::Required {
                field: "productId".to_string(),
            }
            .into());
        }
        ensure_positive(product_id, line.quantity)?;

        match positions.get(product_id) {
            Some(&index) => merged[index].quantity += line.quantity,
            None => {
                positions.insert(product_id, merged.len());
                merged.push(LineRequest::new(product_id, line.quantity));
            }
        }
    }

    if merged.len() > max_lines {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: max_lines as i64,
        }
        .into());
    }

    Ok(merged)
}

/// Trims optional free text; blank becomes `None`.
pub fn optional_text(field: &str, value: Option<String>, max: usize) -> CoreResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }
        .into());
    }

    Ok(Some(trimmed.to_string()))
}

/// Drawer amounts (opening, counted at close) cannot be negative.
pub fn non_negative_amount(field: &str, cents: i64) -> CoreResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Caller identity must carry a user id.
pub fn require_user_id(user_id: &str) -> CoreResult<()> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "userId".to_string(),
        }
        .into());
    }
    Ok(())
}
