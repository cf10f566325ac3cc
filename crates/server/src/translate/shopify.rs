//! Shopify REST Admin API payloads.
//!
//! Products carry price, SKU and stock on their variants: the product price
//! is the first variant's price and stock is the sum over all variants.

use rust_decimal::Decimal;
use serde_json::Value;

use storesync_core::{
    Address, Cancellation, Customer, EntityKind, FulfillmentStatus, LineItem, Order, OrderStatus,
    PLACEHOLDER_IMAGE_URL, Product, ProductVariant, UNCATEGORIZED, UNKNOWN_BRAND, non_negative,
};

use super::TranslationError;
use super::fields::{
    count, email, flag, id, is_featured, is_recent, line_item as build_line_item, money,
    money_sum, optional_id, optional_money, tags, text, text_or, timestamp, total_stock,
};

/// Translate a Shopify product.
///
/// # Errors
///
/// Returns `TranslationError` if the ID is missing or a price is unreadable.
pub fn product(payload: &Value, now: chrono::DateTime<chrono::Utc>) -> Result<Product, TranslationError> {
    let external_id = id(payload, "id", EntityKind::Product)?;

    let raw_variants = payload
        .get("variants")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let variants = raw_variants
        .iter()
        .map(variant)
        .collect::<Result<Vec<_>, _>>()?;
    let first = raw_variants.first();

    let price = variants.first().map_or(Decimal::ZERO, |v| v.price);
    let compare_at_price = optional_money(
        first.and_then(|v| v.get("compare_at_price")),
        "compare_at_price",
    )?
    .map(non_negative);

    let images: Vec<String> = payload
        .get("images")
        .and_then(Value::as_array)
        .map(|images| images.iter().filter_map(|i| text(i.get("src"))).collect())
        .unwrap_or_default();
    let image_url = text(payload.pointer("/image/src"))
        .or_else(|| images.first().cloned())
        .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string());

    let tags = tags(payload.get("tags"));
    let added_at = timestamp(payload.get("created_at"));

    Ok(Product {
        external_id,
        name: text_or(payload.get("title"), ""),
        brand: text_or(payload.get("vendor"), UNKNOWN_BRAND),
        category: text_or(payload.get("product_type"), UNCATEGORIZED),
        price,
        compare_at_price,
        description: text_or(payload.get("body_html"), ""),
        image_url,
        images,
        stock_quantity: total_stock(variants.iter().map(|v| v.quantity)),
        sku: first.and_then(|v| text(v.get("sku"))),
        barcode: first.and_then(|v| text(v.get("barcode"))),
        is_new: is_recent(added_at, now),
        is_featured: is_featured(&tags),
        tags,
        variants,
        popularity: 0,
        added_at,
        platform_updated_at: timestamp(payload.get("updated_at")),
    })
}

fn variant(value: &Value) -> Result<ProductVariant, TranslationError> {
    Ok(ProductVariant {
        external_id: optional_id(value.get("id")),
        title: text_or(value.get("title"), ""),
        price: non_negative(money(value.get("price"), "variants.price")?),
        sku: text(value.get("sku")),
        quantity: count(value.get("inventory_quantity")),
    })
}

/// Translate a Shopify customer.
///
/// # Errors
///
/// Returns `TranslationError` if the ID is missing or `total_spent` is unreadable.
pub fn customer(payload: &Value) -> Result<Customer, TranslationError> {
    let accepts_marketing = payload.get("accepts_marketing").map_or_else(
        || {
            payload
                .pointer("/email_marketing_consent/state")
                .and_then(Value::as_str)
                == Some("subscribed")
        },
        |v| flag(Some(v)),
    );

    Ok(Customer {
        external_id: id(payload, "id", EntityKind::Customer)?,
        first_name: text_or(payload.get("first_name"), ""),
        last_name: text_or(payload.get("last_name"), ""),
        email: email(payload.get("email")),
        phone: text(payload.get("phone")),
        address: address(payload.get("default_address")),
        orders_count: count(payload.get("orders_count")),
        total_spent: non_negative(money(payload.get("total_spent"), "total_spent")?),
        tags: tags(payload.get("tags")),
        accepts_marketing,
        platform_created_at: timestamp(payload.get("created_at")),
        platform_updated_at: timestamp(payload.get("updated_at")),
    })
}

/// Translate a Shopify order.
///
/// # Errors
///
/// Returns `TranslationError` if the ID is missing or an amount is unreadable.
pub fn order(payload: &Value) -> Result<Order, TranslationError> {
    let external_id = id(payload, "id", EntityKind::Order)?;
    let order_number = text(payload.get("name"))
        .or_else(|| text(payload.get("order_number")))
        .unwrap_or_else(|| external_id.to_string());

    let line_items = payload
        .get("line_items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(line_item).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let shipping = match payload.pointer("/total_shipping_price_set/shop_money/amount") {
        Some(amount) => money(Some(amount), "total_shipping_price_set")?,
        None => shipping_lines_total(payload)?,
    };

    let cancellation = timestamp(payload.get("cancelled_at")).map(|cancelled_at| Cancellation {
        cancelled_at,
        reason: text(payload.get("cancel_reason")),
    });
    let status = if cancellation.is_some() {
        OrderStatus::Cancelled
    } else {
        payload
            .get("financial_status")
            .and_then(Value::as_str)
            .map_or(OrderStatus::Pending, OrderStatus::from_platform)
    };

    Ok(Order {
        external_id,
        order_number,
        customer_external_id: optional_id(payload.pointer("/customer/id")),
        line_items,
        subtotal: non_negative(money(payload.get("subtotal_price"), "subtotal_price")?),
        tax: non_negative(money(payload.get("total_tax"), "total_tax")?),
        shipping: non_negative(shipping),
        discount: non_negative(money(payload.get("total_discounts"), "total_discounts")?),
        total: non_negative(money(payload.get("total_price"), "total_price")?),
        currency: text_or(payload.get("currency"), "USD"),
        status,
        fulfillment_status: payload
            .get("fulfillment_status")
            .and_then(Value::as_str)
            .and_then(FulfillmentStatus::from_platform),
        shipping_address: address(payload.get("shipping_address")),
        billing_address: address(payload.get("billing_address")),
        cancellation,
        placed_at: timestamp(payload.get("processed_at"))
            .or_else(|| timestamp(payload.get("created_at"))),
        platform_updated_at: timestamp(payload.get("updated_at")),
    })
}

fn line_item(value: &Value) -> Result<LineItem, TranslationError> {
    let name = text(value.get("title"))
        .or_else(|| text(value.get("name")))
        .unwrap_or_default();
    let mut item = build_line_item(
        name,
        count(value.get("quantity")),
        money(value.get("price"), "line_items.price")?,
        None,
        "line_items",
    )?;
    item.product_external_id = optional_id(value.get("product_id"));
    item.variant_external_id = optional_id(value.get("variant_id"));
    item.sku = text(value.get("sku"));
    Ok(item)
}

fn shipping_lines_total(payload: &Value) -> Result<Decimal, TranslationError> {
    payload
        .get("shipping_lines")
        .and_then(Value::as_array)
        .map_or(Ok(Decimal::ZERO), |lines| {
            let prices = lines
                .iter()
                .map(|line| money(line.get("price"), "shipping_lines.price"))
                .collect::<Result<Vec<_>, _>>()?;
            money_sum(prices, "shipping_lines.price")
        })
}

fn address(value: Option<&Value>) -> Option<Address> {
    let value = value.filter(|v| v.is_object())?;
    let name = text(value.get("name")).or_else(|| {
        let joined = [text(value.get("first_name")), text(value.get("last_name"))]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    });

    let address = Address {
        name,
        company: text(value.get("company")),
        line1: text(value.get("address1")),
        line2: text(value.get("address2")),
        city: text(value.get("city")),
        province: text(value.get("province")),
        country: text(value.get("country")),
        zip: text(value.get("zip")),
        phone: text(value.get("phone")),
    };
    (!address.is_empty()).then_some(address)
}
