//! Pure mapping from the bank wire schema to the normalized internal model.
//!
//! No I/O happens here. Balance derivation follows the ledger convention:
//! each balance type contributes `credit - debit`, and an absent entry simply
//! contributes zero (missing data is not an error at this level).

use crate::models::{
    AccountDetail, AccountSummary, Balance, BalanceType, CreditOrDebit, NormalizedAccount,
};
use bigdecimal::BigDecimal;
use serde_json::Value;

/// Maps a fully retrieved account to the internal representation.
///
/// `account_type` comes from the "list accounts" response, which is
/// authoritative for the type even when the detail call omits it.
/// `transactions` is `None` when transaction inclusion is disabled.
pub fn map_account(
    mut detail: AccountDetail,
    account_type: Option<String>,
    transactions: Option<Vec<Value>>,
) -> NormalizedAccount {
    if account_type.is_some() {
        detail.account_type = account_type;
    }

    let available = available_balance(detail.balances.as_deref());
    let booked = booked_balance(detail.balances.as_deref());

    NormalizedAccount {
        account_number: detail.account_identifier.clone(),
        account_detail: detail,
        transactions,
        account_available_balance: available,
        account_booked_balance: booked,
        has_errors: false,
    }
}

/// Builds the degraded representation used when account-detail retrieval
/// failed but the account must still appear in the result: zero balances,
/// no transactions, `has_errors` set.
pub fn degraded_account(summary: &AccountSummary) -> NormalizedAccount {
    NormalizedAccount {
        account_number: Some(summary.account_identifier.clone()),
        account_detail: AccountDetail {
            account_reference: Some(summary.account_reference.clone()),
            account_identifier: Some(summary.account_identifier.clone()),
            account_type: summary.account_type.clone(),
            status: summary.status.clone(),
            primary_owner: summary.primary_owner.clone(),
            servicer: summary.servicer.clone(),
            balances: None,
        },
        transactions: None,
        account_available_balance: BigDecimal::from(0),
        account_booked_balance: BigDecimal::from(0),
        has_errors: true,
    }
}

/// Available balance: `credit - debit` over the available entries.
pub fn available_balance(balances: Option<&[Balance]>) -> BigDecimal {
    net_balance(balances, BalanceType::AvailableBalance)
}

/// Booked balance: `credit - debit` over the booked entries.
pub fn booked_balance(balances: Option<&[Balance]>) -> BigDecimal {
    net_balance(balances, BalanceType::BookedBalance)
}

fn net_balance(balances: Option<&[Balance]>, balance_type: BalanceType) -> BigDecimal {
    let credit = balance_amount(balances, balance_type, CreditOrDebit::Credit);
    let debit = balance_amount(balances, balance_type, CreditOrDebit::Debit);
    credit - debit
}

fn balance_amount(
    balances: Option<&[Balance]>,
    balance_type: BalanceType,
    indicator: CreditOrDebit,
) -> BigDecimal {
    balances
        .and_then(|entries| {
            entries
                .iter()
                .find(|b| b.balance_type == balance_type && b.credit_debit_indicator == indicator)
                .map(|b| b.amount.clone())
        })
        .unwrap_or_else(|| BigDecimal::from(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn balance(balance_type: BalanceType, indicator: CreditOrDebit, amount: &str) -> Balance {
        Balance {
            balance_type,
            credit_debit_indicator: indicator,
            amount: BigDecimal::from_str(amount).unwrap(),
            currency: Some("NOK".to_string()),
        }
    }

    fn detail_with_balances(balances: Vec<Balance>) -> AccountDetail {
        AccountDetail {
            account_reference: Some("ref-1".to_string()),
            account_identifier: Some("12345678901".to_string()),
            account_type: None,
            status: Some("enabled".to_string()),
            primary_owner: None,
            servicer: None,
            balances: Some(balances),
        }
    }

    #[test]
    fn available_is_credit_minus_debit() {
        let balances = vec![
            balance(BalanceType::AvailableBalance, CreditOrDebit::Credit, "100"),
            balance(BalanceType::AvailableBalance, CreditOrDebit::Debit, "30"),
        ];
        assert_eq!(
            available_balance(Some(&balances)),
            BigDecimal::from_str("70").unwrap()
        );
    }

    #[test]
    fn absent_booked_entries_default_to_zero() {
        let balances = vec![balance(
            BalanceType::AvailableBalance,
            CreditOrDebit::Credit,
            "100",
        )];
        assert_eq!(booked_balance(Some(&balances)), BigDecimal::from(0));
        assert_eq!(booked_balance(None), BigDecimal::from(0));
    }

    #[test]
    fn map_account_computes_both_balances() {
        let detail = detail_with_balances(vec![
            balance(BalanceType::AvailableBalance, CreditOrDebit::Credit, "100"),
            balance(BalanceType::AvailableBalance, CreditOrDebit::Debit, "0"),
            balance(BalanceType::BookedBalance, CreditOrDebit::Credit, "250.25"),
            balance(BalanceType::BookedBalance, CreditOrDebit::Debit, "50.25"),
        ]);

        let mapped = map_account(detail, Some("current".to_string()), Some(vec![]));
        assert_eq!(
            mapped.account_available_balance,
            BigDecimal::from_str("100").unwrap()
        );
        assert_eq!(
            mapped.account_booked_balance,
            BigDecimal::from_str("200.00").unwrap()
        );
        assert_eq!(mapped.account_number.as_deref(), Some("12345678901"));
        assert_eq!(mapped.account_detail.account_type.as_deref(), Some("current"));
        assert!(!mapped.has_errors);
    }

    #[test]
    fn map_account_keeps_detail_type_when_summary_lacks_one() {
        let mut detail = detail_with_balances(vec![]);
        detail.account_type = Some("savings".to_string());
        let mapped = map_account(detail, None, None);
        assert_eq!(mapped.account_detail.account_type.as_deref(), Some("savings"));
    }

    #[test]
    fn degraded_account_is_zeroed_and_flagged() {
        let summary = AccountSummary {
            account_reference: "ref-9".to_string(),
            account_identifier: "98765432109".to_string(),
            account_type: Some("current".to_string()),
            status: Some("enabled".to_string()),
            primary_owner: None,
            servicer: None,
        };

        let account = degraded_account(&summary);
        assert!(account.has_errors);
        assert!(account.transactions.is_none());
        assert_eq!(account.account_available_balance, BigDecimal::from(0));
        assert_eq!(account.account_booked_balance, BigDecimal::from(0));
        assert_eq!(account.account_number.as_deref(), Some("98765432109"));
        assert!(account.account_detail.balances.is_none());
    }
}
