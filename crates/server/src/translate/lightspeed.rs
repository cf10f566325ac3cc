//! Lightspeed Retail (R-Series) payloads.
//!
//! Lightspeed serializes every value as a string and collapses one-element
//! lists into a bare object (`"ItemPrice": {...}` instead of `[{...}]`), so
//! nested lists are always read through [`one_or_many`].

use rust_decimal::Decimal;
use serde_json::Value;

use storesync_core::{
    Address, Customer, EntityKind, FulfillmentStatus, LineItem, Order, OrderStatus,
    PLACEHOLDER_IMAGE_URL, Product, UNCATEGORIZED, UNKNOWN_BRAND, non_negative,
};

use super::TranslationError;
use super::fields::{
    count, email, flag, id, is_featured, is_recent, line_item as build_line_item, money,
    money_sum, one_or_many, optional_id, text, text_or, timestamp, total_stock,
};

/// Lightspeed sales carry no currency; accounts are single-currency.
const DEFAULT_CURRENCY: &str = "USD";

/// The `ItemShop` row that aggregates stock across every shop.
const ALL_SHOPS_ID: &str = "0";

/// Translate a Lightspeed item.
///
/// # Errors
///
/// Returns `TranslationError` if the ID is missing or a price is unreadable.
pub fn item(payload: &Value, now: chrono::DateTime<chrono::Utc>) -> Result<Product, TranslationError> {
    let external_id = id(payload, "itemID", EntityKind::Product)?;

    let mut price = Decimal::ZERO;
    let mut compare_at_price = None;
    for item_price in one_or_many(payload.pointer("/Prices/ItemPrice")) {
        match item_price.get("useType").and_then(Value::as_str) {
            Some("Default") => {
                price = non_negative(money(item_price.get("amount"), "Prices.Default")?);
            }
            Some("MSRP") => {
                let msrp = money(item_price.get("amount"), "Prices.MSRP")?;
                compare_at_price = (msrp > Decimal::ZERO).then_some(msrp);
            }
            _ => {}
        }
    }

    let images: Vec<String> = one_or_many(payload.pointer("/Images/Image"))
        .into_iter()
        .filter_map(image_url)
        .collect();
    let tags = tags(payload);
    let added_at = timestamp(payload.get("createTime"));

    Ok(Product {
        external_id,
        name: text_or(payload.get("description"), ""),
        brand: text_or(payload.pointer("/Manufacturer/name"), UNKNOWN_BRAND),
        category: text_or(payload.pointer("/Category/name"), UNCATEGORIZED),
        price,
        compare_at_price,
        description: text_or(payload.pointer("/ItemECommerce/longDescription"), ""),
        image_url: images
            .first()
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string()),
        images,
        stock_quantity: stock(payload),
        sku: text(payload.get("customSku")).or_else(|| text(payload.get("systemSku"))),
        barcode: text(payload.get("upc")).or_else(|| text(payload.get("ean"))),
        is_new: is_recent(added_at, now),
        is_featured: is_featured(&tags),
        tags,
        variants: vec![],
        popularity: 0,
        added_at,
        platform_updated_at: timestamp(payload.get("timeStamp")),
    })
}

fn stock(payload: &Value) -> i64 {
    let shops = one_or_many(payload.pointer("/ItemShops/ItemShop"));
    shops
        .iter()
        .find(|shop| text(shop.get("shopID")).as_deref() == Some(ALL_SHOPS_ID))
        .map_or_else(
            || total_stock(shops.iter().map(|shop| count(shop.get("qoh")))),
            |all| count(all.get("qoh")),
        )
}

fn image_url(image: &Value) -> Option<String> {
    let base = text(image.get("baseImageURL"))?;
    let public_id = text(image.get("publicID"))?;
    Some(format!("{}/{public_id}.jpg", base.trim_end_matches('/')))
}

fn tags(payload: &Value) -> std::collections::BTreeSet<String> {
    one_or_many(payload.pointer("/Tags/tag"))
        .into_iter()
        .filter_map(|t| text(Some(t)))
        .collect()
}

/// Translate a Lightspeed customer.
///
/// # Errors
///
/// Returns `TranslationError` if the ID is missing.
pub fn customer(payload: &Value) -> Result<Customer, TranslationError> {
    let contact = payload.get("Contact");
    let contact_field = |pointer: &str| contact.and_then(|c| c.pointer(pointer));

    let email = one_or_many(contact_field("/Emails/ContactEmail"))
        .into_iter()
        .find_map(|e| email(e.get("address")));
    let phone = one_or_many(contact_field("/Phones/ContactPhone"))
        .into_iter()
        .find_map(|p| text(p.get("number")));
    let address = one_or_many(contact_field("/Addresses/ContactAddress"))
        .into_iter()
        .find_map(address);

    Ok(Customer {
        external_id: id(payload, "customerID", EntityKind::Customer)?,
        first_name: text_or(payload.get("firstName"), ""),
        last_name: text_or(payload.get("lastName"), ""),
        email,
        phone,
        address,
        orders_count: 0,
        total_spent: Decimal::ZERO,
        tags: tags(payload),
        accepts_marketing: contact_field("/noEmail").is_some_and(|v| !flag(Some(v))),
        platform_created_at: timestamp(payload.get("createTime")),
        platform_updated_at: timestamp(payload.get("timeStamp")),
    })
}

fn address(value: &Value) -> Option<Address> {
    let address = Address {
        name: None,
        company: None,
        line1: text(value.get("address1")),
        line2: text(value.get("address2")),
        city: text(value.get("city")),
        province: text(value.get("state")),
        country: text(value.get("country")),
        zip: text(value.get("zip")),
        phone: None,
    };
    (!address.is_empty()).then_some(address)
}

/// Translate a Lightspeed sale.
///
/// # Errors
///
/// Returns `TranslationError` if the ID is missing or an amount is unreadable.
pub fn sale(payload: &Value) -> Result<Order, TranslationError> {
    let external_id = id(payload, "saleID", EntityKind::Order)?;
    let order_number = text(payload.get("ticketNumber")).unwrap_or_else(|| external_id.to_string());

    let line_items = one_or_many(payload.pointer("/SaleLines/SaleLine"))
        .into_iter()
        .map(sale_line)
        .collect::<Result<Vec<_>, _>>()?;

    let tax = money_sum(
        [
            money(payload.get("calcTax1"), "calcTax1")?,
            money(payload.get("calcTax2"), "calcTax2")?,
        ],
        "calcTax",
    )?;
    let (status, fulfillment_status) = sale_status(payload);

    Ok(Order {
        external_id,
        order_number,
        customer_external_id: optional_id(payload.get("customerID")),
        line_items,
        subtotal: non_negative(money(payload.get("calcSubtotal"), "calcSubtotal")?),
        tax: non_negative(tax),
        shipping: Decimal::ZERO,
        discount: non_negative(money(payload.get("calcDiscount"), "calcDiscount")?),
        total: non_negative(money(payload.get("calcTotal"), "calcTotal")?),
        currency: DEFAULT_CURRENCY.to_string(),
        status,
        fulfillment_status,
        shipping_address: None,
        billing_address: None,
        cancellation: None,
        placed_at: timestamp(payload.get("completeTime"))
            .or_else(|| timestamp(payload.get("createTime"))),
        platform_updated_at: timestamp(payload.get("timeStamp")),
    })
}

/// Map the sale's boolean flags onto an order status.
///
/// A completed sale is paid and handed over at the register. An archived sale
/// that never completed was abandoned.
fn sale_status(payload: &Value) -> (OrderStatus, Option<FulfillmentStatus>) {
    let completed = flag(payload.get("completed"));
    if flag(payload.get("voided")) {
        (OrderStatus::Voided, None)
    } else if completed {
        (OrderStatus::Paid, Some(FulfillmentStatus::Fulfilled))
    } else if flag(payload.get("archived")) {
        (OrderStatus::Cancelled, None)
    } else {
        (OrderStatus::Pending, Some(FulfillmentStatus::Unfulfilled))
    }
}

fn sale_line(value: &Value) -> Result<LineItem, TranslationError> {
    let name = text(value.pointer("/Item/description"))
        .or_else(|| text(value.get("note")))
        .unwrap_or_default();
    let line_total = match value.get("calcTotal") {
        None | Some(Value::Null) => None,
        total => Some(money(total, "SaleLine.calcTotal")?),
    };

    let mut item = build_line_item(
        name,
        count(value.get("unitQuantity")),
        money(value.get("unitPrice"), "SaleLine.unitPrice")?,
        line_total,
        "SaleLine",
    )?;
    item.product_external_id = optional_id(value.get("itemID"));
    item.sku = text(value.pointer("/Item/customSku"))
        .or_else(|| text(value.pointer("/Item/systemSku")));
    Ok(item)
}
