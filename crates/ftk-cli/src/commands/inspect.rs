//! Offline commands: payload validation, transition table, audit verification.

use anyhow::{bail, Result};
use ftk_audit::{verify_chain, ChainReport};
use ftk_order::{allowed_actions, transition_table, validate, OrderStatus};
use serde_json::Value;

pub fn validate_payload(payload: &Value) -> Result<()> {
    match validate(payload) {
        Ok(req) => {
            println!("valid=true");
            println!("order_id={}", req.order_id);
            println!("action={}", req.action);
            if let Some(ms) = req.expected_updated_at_ms {
                println!("expected_updated_at_ms={}", ms);
            }
            println!("manager_override={}", req.is_override());
            Ok(())
        }
        Err(p) => {
            println!("valid=false");
            for f in &p.faults {
                println!("offending={} kind={}", f.field, f.kind.as_str());
            }
            println!("received_keys={}", p.received_keys.join(","));
            Err(p.into())
        }
    }
}

pub fn print_table() {
    for (from, action, to) in transition_table() {
        println!("from={} action={} to={}", from, action, to);
    }
    for s in OrderStatus::ALL {
        if allowed_actions(s).is_empty() {
            println!("terminal={}", s);
        }
    }
}

pub fn audit_verify(path: &str) -> Result<()> {
    match verify_chain(path)? {
        ChainReport::Intact { records } => {
            println!("audit_chain=valid lines={}", records);
            Ok(())
        }
        ChainReport::Broken { line, reason } => {
            println!("audit_chain=broken line={}", line);
            bail!("AUDIT_CHAIN_BROKEN at line {}: {}", line, reason)
        }
    }
}
