//! Input validation and coercion
//!
//! Request bodies arrive as raw JSON and leave this module either as typed
//! models or as a list of `(field, message)` issues. Numeric fields accept
//! numbers or numeric strings (`"1"` becomes `1`); dates accept RFC 3339
//! date-times, plain `YYYY-MM-DD` dates, or epoch milliseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::models::{
    Credentials, ItemUpdate, NewItem, NewOrder, OrderPatch, Registration,
};

const ORDER_ID: &[&str] = &["numeroPedido", "orderId"];
const ORDER_VALUE: &[&str] = &["valorTotal", "value"];
const CREATION_DATE: &[&str] = &["dataCriacao", "creationDate"];
const ITEMS: &[&str] = &["items"];
const PRODUCT_ID: &[&str] = &["idItem", "productId"];
const PRICE: &[&str] = &["valorItem", "price"];
const QUANTITY: &[&str] = &["quantidadeItem", "quantity"];
const REMOVE_ITEMS: &[&str] = &["removeItems"];
const ADD_ITEMS: &[&str] = &["addItems"];
const UPDATE_ITEMS: &[&str] = &["updateItems"];

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, Vec<ValidationIssue>>;

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password length (8 to 50 characters)
pub fn validate_password(password: &str) -> Result<(), String> {
    let length = password.chars().count();

    if length < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if length > 50 {
        return Err("Password must be at most 50 characters long".to_string());
    }

    Ok(())
}

/// Validate a first or last name (2 to 100 characters)
pub fn validate_name(name: &str) -> Result<(), String> {
    let length = name.chars().count();

    if length < 2 {
        return Err("Name must be at least 2 characters long".to_string());
    }

    if length > 100 {
        return Err("Name must be at most 100 characters long".to_string());
    }

    Ok(())
}

/// Check every sign-up field, reporting all failures at once
pub fn validate_registration(registration: &Registration) -> Vec<ValidationIssue> {
    [
        ("email", validate_email(&registration.email)),
        ("password", validate_password(&registration.password)),
        ("firstName", validate_name(&registration.first_name)),
        ("lastName", validate_name(&registration.last_name)),
    ]
    .into_iter()
    .filter_map(|(field, result)| result.err().map(|message| ValidationIssue::new(field, message)))
    .collect()
}

/// Parse a sign-up body. Shape rules are applied by the authenticator.
pub fn parse_sign_up(body: &Value) -> ValidationResult<Registration> {
    let mut parser = Parser::default();
    let obj = parser.object(body)?;

    let email = parser.string(obj, "", &["email"]);
    let password = parser.string(obj, "", &["password"]);
    let first_name = parser.string(obj, "", &["firstName"]);
    let last_name = parser.string(obj, "", &["lastName"]);

    match (email, password, first_name, last_name) {
        (Some(email), Some(password), Some(first_name), Some(last_name)) if parser.is_clean() => {
            Ok(Registration {
                email,
                password,
                first_name,
                last_name,
            })
        }
        _ => Err(parser.issues),
    }
}

/// Parse and validate a sign-in body
pub fn parse_sign_in(body: &Value) -> ValidationResult<Credentials> {
    let mut parser = Parser::default();
    let obj = parser.object(body)?;

    let email = parser.string(obj, "", &["email"]);
    if let Some(Err(message)) = email.as_deref().map(validate_email) {
        parser.issue("email", message);
    }

    let password = parser.string(obj, "", &["password"]);
    if let Some(Err(message)) = password.as_deref().map(validate_password) {
        parser.issue("password", message);
    }

    match (email, password) {
        (Some(email), Some(password)) if parser.is_clean() => Ok(Credentials { email, password }),
        _ => Err(parser.issues),
    }
}

/// Parse an order creation body
pub fn parse_new_order(body: &Value) -> ValidationResult<NewOrder> {
    let mut parser = Parser::default();
    let obj = parser.object(body)?;

    let order_id = parser.string(obj, "", ORDER_ID);
    if order_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        parser.issue(ORDER_ID[0], "Order requires an orderId");
    }

    let value = parser
        .required(obj, "", ORDER_VALUE)
        .and_then(|v| parser.decimal(v, ORDER_VALUE[0]));
    let creation_date = parser
        .required(obj, "", CREATION_DATE)
        .and_then(|v| parser.datetime(v, CREATION_DATE[0]));

    let items = match parser.required(obj, "", ITEMS) {
        Some(Value::Array(entries)) => {
            if entries.is_empty() {
                parser.issue(ITEMS[0], "Order must contain at least one item");
            }
            let mut items: Vec<NewItem> = Vec::with_capacity(entries.len());
            for (index, entry) in entries.iter().enumerate() {
                let prefix = format!("items.{index}");
                if let Some(item) = parser.new_item(entry, &prefix) {
                    parser.unique_product(&items, &item, &prefix);
                    items.push(item);
                }
            }
            Some(items)
        }
        Some(_) => {
            parser.issue(ITEMS[0], "Expected an array");
            None
        }
        None => None,
    };

    match (order_id, value, creation_date, items) {
        (Some(order_id), Some(value), Some(creation_date), Some(items)) if parser.is_clean() => {
            Ok(NewOrder {
                order_id,
                value,
                creation_date,
                items,
            })
        }
        _ => Err(parser.issues),
    }
}

/// Parse a sparse order patch body
pub fn parse_order_patch(body: &Value) -> ValidationResult<OrderPatch> {
    let mut parser = Parser::default();
    let obj = parser.object(body)?;
    let mut patch = OrderPatch::default();

    if let Some(v) = lookup(obj, ORDER_VALUE) {
        patch.value = parser.decimal(v, ORDER_VALUE[0]);
    }
    if let Some(v) = lookup(obj, CREATION_DATE) {
        patch.creation_date = parser.datetime(v, CREATION_DATE[0]);
    }

    if let Some(entries) = parser.optional_array(obj, REMOVE_ITEMS) {
        for (index, entry) in entries.iter().enumerate() {
            if let Some(id) = parser.integer(entry, &format!("removeItems.{index}")) {
                patch.remove_items.push(id);
            }
        }
    }

    if let Some(entries) = parser.optional_array(obj, ADD_ITEMS) {
        for (index, entry) in entries.iter().enumerate() {
            let prefix = format!("addItems.{index}");
            if let Some(item) = parser.new_item(entry, &prefix) {
                parser.unique_product(&patch.add_items, &item, &prefix);
                patch.add_items.push(item);
            }
        }
    }

    if let Some(entries) = parser.optional_array(obj, UPDATE_ITEMS) {
        for (index, entry) in entries.iter().enumerate() {
            if let Some(update) = parser.item_update(entry, &format!("updateItems.{index}")) {
                patch.update_items.push(update);
            }
        }
    }

    if parser.is_clean() {
        Ok(patch)
    } else {
        Err(parser.issues)
    }
}

/// First present, non-null value among the accepted names of a field
fn lookup<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|value| !value.is_null())
}

fn path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Collects issues while walking a body
#[derive(Default)]
struct Parser {
    issues: Vec<ValidationIssue>,
}

impl Parser {
    fn issue(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(field, message));
    }

    fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn object<'a>(&self, body: &'a Value) -> ValidationResult<&'a Map<String, Value>> {
        body.as_object().ok_or_else(|| {
            vec![ValidationIssue::new(
                "body",
                format!("Expected an object, received {}", kind(body)),
            )]
        })
    }

    fn required<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        prefix: &str,
        names: &[&str],
    ) -> Option<&'a Value> {
        let value = lookup(obj, names);
        if value.is_none() {
            self.issue(path(prefix, names[0]), "Required");
        }
        value
    }

    fn optional_array<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        names: &[&str],
    ) -> Option<&'a Vec<Value>> {
        match lookup(obj, names)? {
            Value::Array(entries) => Some(entries),
            other => {
                self.issue(names[0], format!("Expected an array, received {}", kind(other)));
                None
            }
        }
    }

    fn string(&mut self, obj: &Map<String, Value>, prefix: &str, names: &[&str]) -> Option<String> {
        match self.required(obj, prefix, names)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.issue(
                    path(prefix, names[0]),
                    format!("Expected a string, received {}", kind(other)),
                );
                None
            }
        }
    }

    fn integer(&mut self, value: &Value, field: &str) -> Option<i32> {
        let parsed = match value {
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<i32>().ok(),
            other => {
                self.issue(field, format!("Expected a number, received {}", kind(other)));
                return None;
            }
        };

        if parsed.is_none() {
            self.issue(field, "Expected a whole number within range");
        }
        parsed
    }

    fn decimal(&mut self, value: &Value, field: &str) -> Option<Decimal> {
        let parsed = match value {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s),
            other => {
                self.issue(field, format!("Expected a number, received {}", kind(other)));
                return None;
            }
        };

        if parsed.is_none() {
            self.issue(field, "Expected a number");
        }
        parsed
    }

    fn datetime(&mut self, value: &Value, field: &str) -> Option<DateTime<Utc>> {
        let parsed = match value {
            Value::String(s) => parse_datetime(s),
            Value::Number(n) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        };

        if parsed.is_none() {
            self.issue(field, "Invalid date");
        }
        parsed
    }

    /// Flag `item` when an earlier entry of the same list has its product id
    fn unique_product(&mut self, earlier: &[NewItem], item: &NewItem, prefix: &str) {
        if earlier.iter().any(|other| other.product_id == item.product_id) {
            self.issue(
                path(prefix, PRODUCT_ID[0]),
                format!("Product {} appears more than once", item.product_id),
            );
        }
    }

    fn new_item(&mut self, entry: &Value, prefix: &str) -> Option<NewItem> {
        let Some(obj) = entry.as_object() else {
            self.issue(prefix, format!("Expected an object, received {}", kind(entry)));
            return None;
        };

        let product_id = self
            .required(obj, prefix, PRODUCT_ID)
            .and_then(|v| self.integer(v, &path(prefix, PRODUCT_ID[0])));
        let price = self
            .required(obj, prefix, PRICE)
            .and_then(|v| self.decimal(v, &path(prefix, PRICE[0])));
        let quantity = self
            .required(obj, prefix, QUANTITY)
            .and_then(|v| self.integer(v, &path(prefix, QUANTITY[0])));

        Some(NewItem {
            product_id: product_id?,
            price: price?,
            quantity: quantity?,
        })
    }

    fn item_update(&mut self, entry: &Value, prefix: &str) -> Option<ItemUpdate> {
        let Some(obj) = entry.as_object() else {
            self.issue(prefix, format!("Expected an object, received {}", kind(entry)));
            return None;
        };

        let product_id = self
            .required(obj, prefix, PRODUCT_ID)
            .and_then(|v| self.integer(v, &path(prefix, PRODUCT_ID[0])));

        let mut update = ItemUpdate {
            product_id: 0,
            price: None,
            quantity: None,
        };
        if let Some(v) = lookup(obj, PRICE) {
            update.price = Some(self.decimal(v, &path(prefix, PRICE[0]))?);
        }
        if let Some(v) = lookup(obj, QUANTITY) {
            update.quantity = Some(self.integer(v, &path(prefix, QUANTITY[0]))?);
        }

        update.product_id = product_id?;
        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|issue| issue.field.as_str()).collect()
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("user@localhost").is_err());
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password(&"x".repeat(50)).is_ok());
        assert!(validate_password(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_name_length() {
        assert!(validate_name("Al").is_ok());
        assert!(validate_name("A").is_err());
        assert!(validate_name(&"n".repeat(101)).is_err());
    }

    #[test]
    fn test_registration_reports_every_bad_field() {
        let registration = Registration {
            email: "bad".to_string(),
            password: "short".to_string(),
            first_name: "A".to_string(),
            last_name: "Valid".to_string(),
        };
        let issues = validate_registration(&registration);
        assert_eq!(fields(&issues), vec!["email", "password", "firstName"]);
    }

    #[test]
    fn test_parse_new_order_coerces_strings() {
        let body = json!({
            "numeroPedido": "ORD-2025-001",
            "valorTotal": "199.99",
            "dataCriacao": "2025-01-15T10:30:00Z",
            "items": [
                { "idItem": "1", "valorItem": 99.99, "quantidadeItem": "2" }
            ]
        });

        let order = parse_new_order(&body).unwrap();
        assert_eq!(order.order_id, "ORD-2025-001");
        assert_eq!(order.value, Decimal::new(19999, 2));
        assert_eq!(
            order.creation_date,
            Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap()
        );
        assert_eq!(
            order.items,
            vec![NewItem {
                product_id: 1,
                price: Decimal::new(9999, 2),
                quantity: 2,
            }]
        );
    }

    #[test]
    fn test_parse_new_order_accepts_english_names() {
        let body = json!({
            "orderId": "ORD-1",
            "value": 20,
            "creationDate": "2025-01-15",
            "items": [{ "productId": 1, "price": 10, "quantity": 2 }]
        });

        let order = parse_new_order(&body).unwrap();
        assert_eq!(order.order_id, "ORD-1");
        assert_eq!(
            order.creation_date,
            Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(order.items[0].quantity, 2);
    }

    #[test]
    fn test_parse_new_order_collects_issues() {
        let body = json!({
            "numeroPedido": "",
            "valorTotal": "abc",
            "items": [{ "idItem": "x", "valorItem": 1 }]
        });

        let issues = parse_new_order(&body).unwrap_err();
        assert_eq!(
            fields(&issues),
            vec![
                "numeroPedido",
                "valorTotal",
                "dataCriacao",
                "items.0.idItem",
                "items.0.quantidadeItem",
            ]
        );
    }

    #[test]
    fn test_parse_new_order_requires_items() {
        let body = json!({
            "numeroPedido": "ORD-1",
            "valorTotal": 1,
            "dataCriacao": "2025-01-15T10:30:00Z",
            "items": []
        });

        let issues = parse_new_order(&body).unwrap_err();
        assert_eq!(fields(&issues), vec!["items"]);
    }

    #[test]
    fn test_parse_new_order_rejects_repeated_product() {
        let body = json!({
            "numeroPedido": "ORD-2",
            "valorTotal": 2,
            "dataCriacao": "2025-01-15",
            "items": [
                { "idItem": 1, "valorItem": 1, "quantidadeItem": 1 },
                { "idItem": "1", "valorItem": 1, "quantidadeItem": 1 }
            ]
        });

        let issues = parse_new_order(&body).unwrap_err();
        assert_eq!(fields(&issues), vec!["items.1.idItem"]);
    }

    #[test]
    fn test_parse_new_order_rejects_non_object() {
        let issues = parse_new_order(&json!([1, 2])).unwrap_err();
        assert_eq!(fields(&issues), vec!["body"]);
    }

    #[test]
    fn test_parse_order_patch() {
        let body = json!({
            "valorTotal": 35.5,
            "removeItems": [1, "3"],
            "addItems": [{ "idItem": "2", "valorItem": "5", "quantidadeItem": 1 }],
            "updateItems": [{ "idItem": 4, "quantidadeItem": 7 }]
        });

        let patch = parse_order_patch(&body).unwrap();
        assert_eq!(patch.value, Some(Decimal::new(355, 1)));
        assert_eq!(patch.creation_date, None);
        assert_eq!(patch.remove_items, vec![1, 3]);
        assert_eq!(patch.add_items[0].product_id, 2);
        assert_eq!(
            patch.update_items,
            vec![ItemUpdate {
                product_id: 4,
                price: None,
                quantity: Some(7),
            }]
        );
    }

    #[test]
    fn test_parse_empty_patch() {
        assert_eq!(parse_order_patch(&json!({})).unwrap(), OrderPatch::default());
    }

    #[test]
    fn test_parse_order_patch_rejects_repeated_added_product() {
        let body = json!({
            "addItems": [
                { "idItem": 5, "valorItem": 1, "quantidadeItem": 1 },
                { "idItem": 6, "valorItem": 1, "quantidadeItem": 1 },
                { "idItem": 5, "valorItem": 2, "quantidadeItem": 2 }
            ]
        });

        let issues = parse_order_patch(&body).unwrap_err();
        assert_eq!(fields(&issues), vec!["addItems.2.idItem"]);
    }

    #[test]
    fn test_parse_order_patch_reports_paths() {
        let body = json!({
            "dataCriacao": "yesterday",
            "removeItems": "1",
            "updateItems": [{ "valorItem": 3 }]
        });

        let issues = parse_order_patch(&body).unwrap_err();
        assert_eq!(
            fields(&issues),
            vec!["dataCriacao", "removeItems", "updateItems.0.idItem"]
        );
    }

    #[test]
    fn test_parse_sign_in() {
        let credentials =
            parse_sign_in(&json!({ "email": "user@example.com", "password": "secret123" }))
                .unwrap();
        assert_eq!(credentials.email, "user@example.com");

        let issues = parse_sign_in(&json!({ "email": "user", "password": 12 })).unwrap_err();
        assert_eq!(fields(&issues), vec!["email", "password"]);
    }

    #[test]
    fn test_parse_sign_up_requires_strings() {
        let issues = parse_sign_up(&json!({ "email": "user@example.com" })).unwrap_err();
        assert_eq!(fields(&issues), vec!["password", "firstName", "lastName"]);
    }
}
