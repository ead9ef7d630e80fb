//! Property-based tests for product identity.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::model::{Product, ProductPatch};

    /// Strategy to generate products that pass validation
    fn product_strategy() -> impl Strategy<Value = Product> {
        (
            "[A-Za-z][A-Za-z0-9 ]{0,20}",
            "[A-Za-z][A-Za-z0-9]{0,15}",
            0.0f64..100_000.0,
            0u64..1_000_000,
            prop::collection::vec("[a-z]{1,10}", 0..5),
        )
            .prop_map(|(name, manufacturer, price, stock, tags)| {
                Product::new(name, manufacturer, price, stock, tags)
            })
    }

    proptest! {
        #[test]
        fn test_id_is_deterministic(product in product_strategy()) {
            let copy = product.clone();
            prop_assert_eq!(product.id(), copy.id());
        }

        #[test]
        fn test_id_is_lowercase_hex_sha256(product in product_strategy()) {
            let id = product.id();
            prop_assert_eq!(id.as_str().len(), 64);
            prop_assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }

        #[test]
        fn test_stock_change_changes_id(product in product_strategy()) {
            let mut changed = product.clone();
            changed.stock = product.stock + 1;
            prop_assert_ne!(product.id(), changed.id());
        }

        #[test]
        fn test_generated_products_validate(product in product_strategy()) {
            prop_assert!(crate::validation::validate_product(&product).is_ok());
        }

        #[test]
        fn test_tag_append_changes_id(product in product_strategy(), tag in "[a-z]{1,10}") {
            let mut changed = product.clone();
            changed.tags.push(tag);
            prop_assert_ne!(product.id(), changed.id());
        }

        #[test]
        fn test_empty_patch_is_identity(product in product_strategy()) {
            let mut patched = product.clone();
            patched.apply(&ProductPatch::default());
            prop_assert_eq!(patched, product);
        }
    }
}
