//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Caller, DoctorId, PatientId, ProviderId};
use domain_billing::{bill_number, Bill, BillCharges, BillItemInput};
use domain_insurance::{InsurancePolicy, PolicyTerms};
use domain_pharmacy::NewMedicine;

use crate::fixtures::{AmountFixtures, CallerFixtures, DateFixtures, IdFixtures};

/// Builder for insurance policies
///
/// Defaults reproduce the worked coverage example: deductible 100 with 40
/// met, 20% co-pay and a 1000 annual cap with nothing used.
pub struct PolicyBuilder {
    patient_id: PatientId,
    provider_id: ProviderId,
    policy_number: String,
    co_pay_amount: Decimal,
    co_pay_percentage: Decimal,
    deductible_amount: Decimal,
    deductible_met: Decimal,
    annual_max_coverage: Option<Decimal>,
    annual_used_amount: Decimal,
    coverage_start: NaiveDate,
    coverage_end: Option<NaiveDate>,
    priority_order: i32,
    is_primary: bool,
    is_active: bool,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            patient_id: IdFixtures::patient_id(),
            provider_id: ProviderId::new_v7(),
            policy_number: "POL-0001".to_string(),
            co_pay_amount: Decimal::ZERO,
            co_pay_percentage: AmountFixtures::co_pay_percentage(),
            deductible_amount: AmountFixtures::deductible(),
            deductible_met: AmountFixtures::deductible_met(),
            annual_max_coverage: Some(AmountFixtures::annual_max()),
            annual_used_amount: Decimal::ZERO,
            coverage_start: DateFixtures::coverage_start(),
            coverage_end: Some(DateFixtures::coverage_end()),
            priority_order: 1,
            is_primary: false,
            is_active: true,
        }
    }

    pub fn with_patient(mut self, patient_id: PatientId) -> Self {
        self.patient_id = patient_id;
        self
    }

    pub fn with_provider(mut self, provider_id: ProviderId) -> Self {
        self.provider_id = provider_id;
        self
    }

    pub fn with_policy_number(mut self, number: impl Into<String>) -> Self {
        self.policy_number = number.into();
        self
    }

    /// Sets a fixed co-pay, which takes precedence over the percentage
    pub fn with_fixed_co_pay(mut self, amount: Decimal) -> Self {
        self.co_pay_amount = amount;
        self
    }

    pub fn with_co_pay_percentage(mut self, percentage: Decimal) -> Self {
        self.co_pay_percentage = percentage;
        self
    }

    /// Sets the deductible and how much of it has been met
    pub fn with_deductible(mut self, amount: Decimal, met: Decimal) -> Self {
        self.deductible_amount = amount;
        self.deductible_met = met;
        self
    }

    /// Sets the annual cap (`None` for uncapped) and current usage
    pub fn with_annual_limit(mut self, cap: Option<Decimal>, used: Decimal) -> Self {
        self.annual_max_coverage = cap;
        self.annual_used_amount = used;
        self
    }

    pub fn with_coverage(mut self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.coverage_start = start;
        self.coverage_end = end;
        self
    }

    pub fn with_priority(mut self, order: i32) -> Self {
        self.priority_order = order;
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Cost-sharing terms as they would arrive in a request
    pub fn terms(&self) -> PolicyTerms {
        PolicyTerms {
            policy_number: self.policy_number.clone(),
            group_number: None,
            co_pay_amount: self.co_pay_amount,
            co_pay_percentage: self.co_pay_percentage,
            deductible_amount: self.deductible_amount,
            annual_max_coverage: self.annual_max_coverage,
            coverage_start: self.coverage_start,
            coverage_end: self.coverage_end,
        }
    }

    /// Builds the policy
    ///
    /// # Panics
    ///
    /// Panics if the configured terms are invalid
    pub fn build(self) -> InsurancePolicy {
        let mut policy = InsurancePolicy::enroll(
            self.patient_id,
            self.provider_id,
            self.terms(),
            self.priority_order,
        )
        .expect("policy builder terms must be valid");
        policy.deductible_met = self.deductible_met;
        policy.annual_used_amount = self.annual_used_amount;
        policy.is_primary = self.is_primary;
        policy.is_active = self.is_active;
        policy
    }
}

/// Builder for bills
///
/// Defaults to sub-total 200, tax 20, discount 10 (total 210).
pub struct BillBuilder {
    sequence: i64,
    patient_id: PatientId,
    doctor_id: Option<DoctorId>,
    charges: BillCharges,
    notes: Option<String>,
    caller: Caller,
}

impl Default for BillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BillBuilder {
    pub fn new() -> Self {
        Self {
            sequence: 1,
            patient_id: IdFixtures::patient_id(),
            doctor_id: None,
            charges: BillCharges {
                sub_total: AmountFixtures::sub_total(),
                discount: AmountFixtures::discount(),
                tax: AmountFixtures::tax(),
                items: Vec::new(),
            },
            notes: None,
            caller: CallerFixtures::admin(),
        }
    }

    pub fn with_sequence(mut self, sequence: i64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_patient(mut self, patient_id: PatientId) -> Self {
        self.patient_id = patient_id;
        self
    }

    pub fn with_doctor(mut self, doctor_id: DoctorId) -> Self {
        self.doctor_id = Some(doctor_id);
        self
    }

    /// Sets flat amounts and clears any items
    pub fn with_amounts(mut self, sub_total: Decimal, tax: Decimal, discount: Decimal) -> Self {
        self.charges = BillCharges { sub_total, tax, discount, items: Vec::new() };
        self
    }

    /// Adds a line item; the sub-total then comes from the items
    pub fn with_item(mut self, description: &str, quantity: i32, unit_price: Decimal) -> Self {
        self.charges.items.push(BillItemInput {
            description: description.to_string(),
            quantity,
            unit_price,
        });
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn created_by(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }

    /// The charges as they would arrive in a request
    pub fn charges(&self) -> BillCharges {
        self.charges.clone()
    }

    /// Builds the bill
    ///
    /// # Panics
    ///
    /// Panics if the configured charges are invalid
    pub fn build(self) -> Bill {
        Bill::create(
            bill_number(2024, self.sequence),
            self.patient_id,
            self.doctor_id,
            self.charges,
            self.notes,
            &self.caller,
        )
        .expect("bill builder charges must be valid")
    }
}

/// Builder for medicine registrations
pub struct MedicineBuilder {
    input: NewMedicine,
}

impl MedicineBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            input: NewMedicine {
                name: name.to_string(),
                generic_name: None,
                sku: name.to_uppercase().replace(' ', "-"),
                unit: "tablet".to_string(),
                stock_quantity: 100,
                reorder_level: 10,
                cost_price: dec!(0.50),
                selling_price: dec!(1.25),
                expiry_date: None,
            },
        }
    }

    pub fn with_stock(mut self, quantity: i32) -> Self {
        self.input.stock_quantity = quantity;
        self
    }

    pub fn with_reorder_level(mut self, level: i32) -> Self {
        self.input.reorder_level = level;
        self
    }

    pub fn with_prices(mut self, cost: Decimal, selling: Decimal) -> Self {
        self.input.cost_price = cost;
        self.input.selling_price = selling;
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.input.sku = sku.into();
        self
    }

    pub fn build(self) -> NewMedicine {
        self.input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_builder_defaults() {
        let policy = PolicyBuilder::new().build();
        assert_eq!(policy.deductible_remaining(), dec!(60));
        assert_eq!(policy.annual_remaining(), Some(dec!(1000)));
        assert!(policy.is_active);
        assert!(!policy.is_primary);
    }

    #[test]
    fn test_bill_builder_defaults() {
        let bill = BillBuilder::new().with_sequence(42).build();
        assert_eq!(bill.bill_number, "BILL202400042");
        assert_eq!(bill.total_amount, AmountFixtures::bill_total());
        assert!(bill.is_balanced());
    }

    #[test]
    fn test_bill_builder_items_drive_sub_total() {
        let bill = BillBuilder::new()
            .with_amounts(dec!(0), dec!(0), dec!(0))
            .with_item("Consultation", 1, dec!(80))
            .with_item("X-ray", 2, dec!(45.50))
            .build();
        assert_eq!(bill.sub_total, dec!(171.00));
        assert_eq!(bill.items.len(), 2);
    }
}
