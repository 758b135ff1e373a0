//! Property-based tests for the record codec and the flat-file store.

use proptest::prelude::*;
use shop_manager::models::{Customer, Product};
use shop_manager::store::codec::{decode_field, decode_record, encode_record};
use shop_manager::store::{FlatFileStore, RecordStore};
use tempfile::TempDir;

// Any single-line text, including delimiters and quotes.
fn field_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[^\r\n]{0,24}",
        "[a-z ,\"]{0,12}",
        Just(String::new()),
        Just("\"\"".to_string()),
    ]
}

fn customer_strategy() -> impl Strategy<Value = (String, String, String, String)> {
    (
        field_strategy(),
        field_strategy(),
        field_strategy(),
        field_strategy(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn encoded_record_decodes_to_same_fields(fields in prop::collection::vec(field_strategy(), 1..8)) {
        let line = encode_record(&fields);
        prop_assert!(!line.contains('\n'));
        prop_assert_eq!(decode_record(&line), fields.clone());
        for (i, field) in fields.iter().enumerate() {
            let decoded = decode_field(&line, i);
            prop_assert_eq!(decoded.as_deref(), Some(field.as_str()));
        }
        prop_assert_eq!(decode_field(&line, fields.len()), None);
    }

    #[test]
    fn adjusted_stock_never_goes_negative(stock in 0u32..=10_000, delta in -20_000i64..20_000) {
        let mut product = Product {
            id: 1,
            name: "Widget".into(),
            category: "Misc".into(),
            brand: "Acme".into(),
            cost_price: Default::default(),
            sell_price: Default::default(),
            stock,
            min_stock_level: 0,
        };
        product.adjust_stock(delta);
        prop_assert_eq!(i64::from(product.stock), (i64::from(stock) + delta).max(0));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scan_yields_appends_in_call_order(rows in prop::collection::vec(customer_strategy(), 0..12)) {
        let dir = TempDir::new().unwrap();
        let store: FlatFileStore<Customer> = FlatFileStore::new(dir.path());

        let expected: Vec<Customer> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (name, phone, email, address))| Customer {
                id: i as u32 + 1,
                name,
                phone,
                email,
                address,
            })
            .collect();
        for customer in &expected {
            store.append(customer).unwrap();
        }

        prop_assert_eq!(store.load_all().unwrap(), expected.clone());
        // Restartable: a second scan sees the same sequence.
        prop_assert_eq!(store.load_all().unwrap(), expected.clone());
        prop_assert_eq!(store.next_id().unwrap(), expected.len() as u32 + 1);
    }

    #[test]
    fn next_id_is_one_past_the_largest_id(ids in prop::collection::btree_set(1u32..5_000, 1..10)) {
        let dir = TempDir::new().unwrap();
        let store: FlatFileStore<Customer> = FlatFileStore::new(dir.path());
        // Insert in descending order so file order and id order differ.
        for id in ids.iter().rev() {
            store
                .append(&Customer {
                    id: *id,
                    name: "n".into(),
                    phone: "p".into(),
                    email: "e".into(),
                    address: "a".into(),
                })
                .unwrap();
        }
        let max = *ids.iter().next_back().unwrap();
        prop_assert_eq!(store.next_id().unwrap(), max + 1);
    }
}
