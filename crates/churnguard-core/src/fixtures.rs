//! Deterministic sample customers for tests, benchmarks and demos

use crate::types::{LabeledRecord, RawRecord};

const INTERNET: [&str; 3] = ["DSL", "Fiber optic", "No"];
const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];
const PAYMENTS: [&str; 4] = [
    "Bank transfer (automatic)",
    "Credit card (automatic)",
    "Electronic check",
    "Mailed check",
];

/// A single valid customer record for the built-in telco schema
pub fn sample_record() -> RawRecord {
    RawRecord::new()
        .with("gender", "Female")
        .with("SeniorCitizen", 0.0)
        .with("Partner", "Yes")
        .with("Dependents", "No")
        .with("tenure", 1.0)
        .with("PhoneService", "No")
        .with("MultipleLines", "No phone service")
        .with("InternetService", "DSL")
        .with("OnlineSecurity", "No")
        .with("OnlineBackup", "Yes")
        .with("DeviceProtection", "No")
        .with("TechSupport", "No")
        .with("StreamingTV", "No")
        .with("StreamingMovies", "No")
        .with("Contract", "Month-to-month")
        .with("PaperlessBilling", "Yes")
        .with("PaymentMethod", "Electronic check")
        .with("MonthlyCharges", 29.85)
}

/// A varied, labeled batch of `n` customers.
///
/// Values cycle through every category of the telco schema. Month-to-month
/// customers who are either new or on fiber internet are labeled as churned,
/// so a linear model can learn the signal.
pub fn sample_batch(n: usize) -> Vec<LabeledRecord> {
    (0..n).map(sample_customer).collect()
}

/// The `i`-th customer of [`sample_batch`]
pub fn sample_customer(i: usize) -> LabeledRecord {
    let yes_no = |k: usize| if k % 2 == 0 { "No" } else { "Yes" };
    let internet = INTERNET[i % 3];
    let contract = CONTRACTS[(i / 3) % 3];
    let payment = PAYMENTS[(i / 2) % 4];
    let phone = yes_no(i / 5 + 1);
    let tenure = ((i * 7) % 72) as f64;
    let monthly = 20.0 + ((i * 13) % 100) as f64 + 0.35;

    let addon = |k: usize| {
        if internet == "No" {
            "No internet service"
        } else {
            yes_no(i / k)
        }
    };

    let record = RawRecord::new()
        .with("gender", if i % 2 == 0 { "Female" } else { "Male" })
        .with("SeniorCitizen", ((i / 4) % 2) as f64)
        .with("Partner", yes_no(i / 3))
        .with("Dependents", yes_no(i / 7))
        .with("tenure", tenure)
        .with("PhoneService", phone)
        .with(
            "MultipleLines",
            if phone == "No" {
                "No phone service"
            } else {
                yes_no(i / 11)
            },
        )
        .with("InternetService", internet)
        .with("OnlineSecurity", addon(2))
        .with("OnlineBackup", addon(3))
        .with("DeviceProtection", addon(5))
        .with("TechSupport", addon(7))
        .with("StreamingTV", addon(11))
        .with("StreamingMovies", addon(13))
        .with("Contract", contract)
        .with("PaperlessBilling", yes_no(i / 2))
        .with("PaymentMethod", payment)
        .with("MonthlyCharges", monthly);

    let churned = contract == "Month-to-month" && (tenure < 36.0 || internet == "Fiber optic");

    LabeledRecord::new(record, churned)
}
