//! Loan amortization builtins
//!
//! Standard annuity formulas over an annual percentage rate compounded
//! monthly. All functions take the rate as a percentage (2.5 means 2.5%/yr)
//! and the term count in months.

use super::eval::float_arg;
use super::value::Value;
use crate::error::{CalcError, Result};

/// Monthly payment that amortizes `principal` over `terms` months
pub fn monthly_payment(principal: f64, annual_rate_pct: f64, terms: f64) -> Result<f64> {
    check_loan_args(principal, annual_rate_pct, terms)?;
    let rate = annual_rate_pct / 100.0 / 12.0;
    if rate == 0.0 {
        return Ok(principal / terms);
    }
    let growth = (1.0 + rate).powf(terms);
    Ok(principal * rate * growth / (growth - 1.0))
}

/// Number of monthly payments of `payment` needed to amortize `principal`
pub fn terms_to_amortize(principal: f64, annual_rate_pct: f64, payment: f64) -> Result<f64> {
    if principal <= 0.0 {
        return Err(CalcError::domain_error("principal must be positive"));
    }
    if annual_rate_pct < 0.0 {
        return Err(CalcError::domain_error("interest rate must not be negative"));
    }
    if payment <= 0.0 {
        return Err(CalcError::domain_error("payment must be positive"));
    }
    let rate = annual_rate_pct / 100.0 / 12.0;
    if rate == 0.0 {
        return Ok(principal / payment);
    }
    let perpetuity = payment / rate;
    if perpetuity <= principal {
        return Err(CalcError::domain_error(
            "payment does not cover the interest; the loan never amortizes",
        ));
    }
    Ok((perpetuity / (perpetuity - principal)).log10() / (1.0 + rate).log10())
}

fn check_loan_args(principal: f64, annual_rate_pct: f64, terms: f64) -> Result<()> {
    if principal <= 0.0 {
        return Err(CalcError::domain_error("principal must be positive"));
    }
    if annual_rate_pct < 0.0 {
        return Err(CalcError::domain_error("interest rate must not be negative"));
    }
    if terms <= 0.0 {
        return Err(CalcError::domain_error("terms must be positive"));
    }
    Ok(())
}

fn loan_args(name: &str, args: &[Value]) -> Result<(f64, f64, f64)> {
    if args.len() != 3 {
        return Err(CalcError::arity_mismatch(name, "3", args.len()));
    }
    Ok((
        float_arg(name, args, 0)?,
        float_arg(name, args, 1)?,
        float_arg(name, args, 2)?,
    ))
}

/// payment(principal, annual_rate_pct, terms)
pub fn builtin_payment(args: &[Value]) -> Result<Value> {
    let (principal, rate, terms) = loan_args("payment", args)?;
    Ok(Value::Float(monthly_payment(principal, rate, terms)?))
}

/// credit_total(principal, annual_rate_pct, terms) - total amount repaid
pub fn builtin_credit_total(args: &[Value]) -> Result<Value> {
    let (principal, rate, terms) = loan_args("credit_total", args)?;
    Ok(Value::Float(monthly_payment(principal, rate, terms)? * terms))
}

/// credit_interest(principal, annual_rate_pct, terms) - total interest paid
pub fn builtin_credit_interest(args: &[Value]) -> Result<Value> {
    let (principal, rate, terms) = loan_args("credit_interest", args)?;
    Ok(Value::Float(
        monthly_payment(principal, rate, terms)? * terms - principal,
    ))
}

/// terms_for(principal, annual_rate_pct, payment)
pub fn builtin_terms_for(args: &[Value]) -> Result<Value> {
    if args.len() != 3 {
        return Err(CalcError::arity_mismatch("terms_for", "3", args.len()));
    }
    let principal = float_arg("terms_for", args, 0)?;
    let rate = float_arg("terms_for", args, 1)?;
    let payment = float_arg("terms_for", args, 2)?;
    Ok(Value::Float(terms_to_amortize(principal, rate, payment)?))
}
