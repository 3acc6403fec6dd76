//! End-to-end tests against the public API.

mod comparison;
mod pipeline;
mod rule_store;

use deal_desk::types::{ApprovalSpec, Vehicle};

pub fn vehicle(id: &str, year: i32, mileage: f64, cost: Option<f64>, black_book: Option<f64>) -> Vehicle {
    Vehicle {
        id: id.to_string(),
        vin: format!("VIN{id}"),
        year,
        make: "Toyota".to_string(),
        model: "Corolla".to_string(),
        trim: None,
        mileage,
        your_cost: cost,
        suggested_price: None,
        black_book_value: black_book,
        in_stock: true,
        image_url: None,
    }
}

pub fn approval(bank: &str, program: &str) -> ApprovalSpec {
    ApprovalSpec {
        bank: bank.to_string(),
        program: program.to_string(),
        apr: 10.0,
        term_months: 72,
        payment_min: 0.0,
        payment_max: 500.0,
        down_payment: 0.0,
        province: Some("AB".to_string()),
        front_cap_factor: None,
        back_cap: None,
        is_native_status: false,
        customer_name: None,
        monthly_income: None,
    }
}
