// ── Address book ──
//
// A named `security address-book`. Addresses come in four shapes (network,
// DNS name, range, wildcard) sharing one `address <name>` namespace, and the
// device lists an address's description before its value, so descriptions
// are collected while parsing and attached at the end.

use std::sync::LazyLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::DeviceContext;
use crate::directive::DirectiveBatch;
use crate::error::CoreError;
use crate::parse::{
    Action, LineError, LineTable, find_or_push, parse_dump, push_unique, split_first,
    strip_token_prefix, unquote,
};
use crate::resource::{Resolved, Resource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressBook {
    pub name: String,
    pub description: String,
    pub network_address: Vec<BookAddress>,
    pub dns_name: Vec<BookAddress>,
    pub range_address: Vec<RangeAddress>,
    pub wildcard_address: Vec<BookAddress>,
    pub address_set: Vec<BookAddressSet>,
    pub attach_zone: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookAddress {
    pub name: String,
    pub value: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeAddress {
    pub name: String,
    pub from: String,
    pub to: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookAddressSet {
    pub name: String,
    pub address: Vec<String>,
    pub address_set: Vec<String>,
    pub description: String,
}

impl AddressBook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.network_address.is_empty()
            && self.dns_name.is_empty()
            && self.range_address.is_empty()
            && self.wildcard_address.is_empty()
            && self.address_set.is_empty()
    }
}

// ── Parser ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Scratch {
    book: AddressBook,
    descriptions: Vec<(String, String)>,
}

impl Scratch {
    fn finish(mut self) -> AddressBook {
        for (name, description) in self.descriptions {
            let book = &mut self.book;
            if let Some(address) = book
                .network_address
                .iter_mut()
                .chain(book.dns_name.iter_mut())
                .chain(book.wildcard_address.iter_mut())
                .find(|a| a.name == name)
            {
                address.description = description;
            } else if let Some(range) = book.range_address.iter_mut().find(|r| r.name == name) {
                range.description = description;
            }
        }
        self.book
    }
}

static BOOK_TABLE: LazyLock<LineTable<Scratch>> = LazyLock::new(|| {
    LineTable::new(vec![
        ("description", Action::Apply(|s: &mut Scratch, rest: &str| {
            s.book.description = unquote(rest);
            Ok(())
        })),
        ("address", Action::Apply(address)),
        ("address-set", Action::Apply(address_set)),
        ("attach zone", Action::Apply(|s: &mut Scratch, rest: &str| {
            push_unique(&mut s.book.attach_zone, unquote(rest));
            Ok(())
        })),
    ])
});

fn named(list: &mut Vec<BookAddress>, name: String, value: &str) {
    let entry = find_or_push(list, |a| a.name == name, || BookAddress {
        name: name.clone(),
        ..BookAddress::default()
    });
    entry.value = unquote(value);
}

fn address(s: &mut Scratch, rest: &str) -> Result<(), LineError> {
    let (name, tail) = split_first(rest);
    if name.is_empty() {
        return Err(LineError::new("missing address name"));
    }
    if let Some(description) = strip_token_prefix(tail, "description") {
        s.descriptions.push((name, unquote(description)));
    } else if let Some(value) = strip_token_prefix(tail, "dns-name") {
        named(&mut s.book.dns_name, name, value);
    } else if let Some(value) = strip_token_prefix(tail, "wildcard-address") {
        named(&mut s.book.wildcard_address, name, value);
    } else if let Some(range) = strip_token_prefix(tail, "range-address") {
        let (from, to) = range
            .split_once(" to ")
            .ok_or_else(|| LineError::new("range-address without an upper bound"))?;
        let entry = find_or_push(&mut s.book.range_address, |r| r.name == name, || RangeAddress {
            name: name.clone(),
            ..RangeAddress::default()
        });
        entry.from = unquote(from);
        entry.to = unquote(to);
    } else if !tail.is_empty() {
        named(&mut s.book.network_address, name, tail);
    }
    Ok(())
}

fn address_set(s: &mut Scratch, rest: &str) -> Result<(), LineError> {
    let (name, tail) = split_first(rest);
    let set = find_or_push(&mut s.book.address_set, |a| a.name == name, || BookAddressSet {
        name: name.clone(),
        ..BookAddressSet::default()
    });
    if let Some(member) = strip_token_prefix(tail, "address") {
        push_unique(&mut set.address, unquote(member));
    } else if let Some(member) = strip_token_prefix(tail, "address-set") {
        push_unique(&mut set.address_set, unquote(member));
    } else if let Some(description) = strip_token_prefix(tail, "description") {
        set.description = unquote(description);
    }
    Ok(())
}

// ── Resource ─────────────────────────────────────────────────────────

#[async_trait]
impl Resource for AddressBook {
    const KIND: &'static str = "address_book";

    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn scope(key: &String) -> String {
        format!("security address-book {key}")
    }

    fn parse(key: &String, dump: &str) -> Result<Self, CoreError> {
        let mut scratch = Scratch::default();
        if parse_dump(&Self::label(key), dump, &BOOK_TABLE, &mut scratch)? {
            scratch.book.name.clone_from(key);
        }
        Ok(scratch.finish())
    }

    fn validate(&self) -> Result<(), CoreError> {
        let label = Self::label(&self.name);
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(CoreError::violation(label, "name", "must be a single non-empty word"));
        }
        if self.is_empty() {
            return Err(CoreError::violation(
                label,
                "network_address",
                "an address book needs at least one address or address set",
            ));
        }
        if self.name == "global" && !self.attach_zone.is_empty() {
            return Err(CoreError::violation(
                label,
                "attach_zone",
                "the global address book cannot be attached to zones",
            ));
        }
        let values = self
            .network_address
            .iter()
            .map(|a| ("network_address", a))
            .chain(self.dns_name.iter().map(|a| ("dns_name", a)))
            .chain(self.wildcard_address.iter().map(|a| ("wildcard_address", a)));
        for (field, address) in values {
            if address.name.is_empty() || address.value.is_empty() {
                return Err(CoreError::violation(label, field, "needs a name and a value"));
            }
        }
        if self
            .range_address
            .iter()
            .any(|r| r.name.is_empty() || r.from.is_empty() || r.to.is_empty())
        {
            return Err(CoreError::violation(
                label,
                "range_address",
                "needs a name and both bounds",
            ));
        }
        if self
            .address_set
            .iter()
            .any(|s| s.name.is_empty() || (s.address.is_empty() && s.address_set.is_empty()))
        {
            return Err(CoreError::violation(
                label,
                "address_set",
                "needs a name and at least one member",
            ));
        }
        Ok(())
    }

    fn compile(&self, _ctx: &DeviceContext, _resolved: &Resolved) -> Result<DirectiveBatch, CoreError> {
        self.validate()?;
        let mut batch = DirectiveBatch::new();
        let mut s = batch.scoped(Self::scope(&self.name));
        s.set_str("description", &self.description);
        for address in &self.network_address {
            let rel = format!("address {}", address.name);
            s.set_value(&rel, &address.value);
            s.set_str(&format!("{rel} description"), &address.description);
        }
        for address in &self.dns_name {
            let rel = format!("address {}", address.name);
            s.set_value(&format!("{rel} dns-name"), &address.value);
            s.set_str(&format!("{rel} description"), &address.description);
        }
        for range in &self.range_address {
            let rel = format!("address {}", range.name);
            s.set(format!("{rel} range-address {} to {}", range.from, range.to));
            s.set_str(&format!("{rel} description"), &range.description);
        }
        for address in &self.wildcard_address {
            let rel = format!("address {}", address.name);
            s.set_value(&format!("{rel} wildcard-address"), &address.value);
            s.set_str(&format!("{rel} description"), &address.description);
        }
        for set in &self.address_set {
            let mut a = s.nested(format!("address-set {}", set.name));
            for member in &set.address {
                a.set_value("address", member);
            }
            for member in &set.address_set {
                a.set_value("address-set", member);
            }
            a.set_str("description", &set.description);
        }
        for zone in &self.attach_zone {
            s.set_value("attach zone", zone);
        }
        Ok(batch)
    }

    fn compile_delete(
        &self,
        _ctx: &DeviceContext,
        _resolved: &Resolved,
    ) -> Result<DirectiveBatch, CoreError> {
        let mut batch = DirectiveBatch::new();
        batch.delete(Self::scope(&self.name));
        Ok(batch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_book_is_rejected() {
        let err = AddressBook::new("global").validate().unwrap_err();
        assert!(matches!(err, CoreError::StructuralConstraintViolation { .. }));
    }

    #[test]
    fn global_book_cannot_attach() {
        let mut book = AddressBook::new("global");
        book.network_address = vec![BookAddress {
            name: "lan".into(),
            value: "10.0.0.0/8".into(),
            description: String::new(),
        }];
        book.attach_zone = vec!["trust".into()];
        assert!(book.validate().is_err());
    }

    #[test]
    fn parses_device_ordering() {
        let dump = "<configuration-output>
set description \"shared objects\"
set address web description \"public web\"
set address web 203.0.113.5/32
set address repo dns-name repo.example.net
set address dhcp range-address 10.0.0.100 to 10.0.0.200
set address dhcp description pool
set address-set frontends address web
set address-set frontends address-set legacy
set attach zone dmz
</configuration-output>";
        let book = AddressBook::parse(&"shared".to_owned(), dump).unwrap();
        assert_eq!(book.name, "shared");
        assert_eq!(book.description, "shared objects");
        assert_eq!(book.network_address[0].description, "public web");
        assert_eq!(book.network_address[0].value, "203.0.113.5/32");
        assert_eq!(book.dns_name[0].value, "repo.example.net");
        assert_eq!(book.range_address[0].to, "10.0.0.200");
        assert_eq!(book.range_address[0].description, "pool");
        assert_eq!(book.address_set[0].address_set, vec!["legacy"]);
        assert_eq!(book.attach_zone, vec!["dmz"]);
    }

    #[test]
    fn compile_round_trips_through_parser() {
        let mut book = AddressBook::new("shared");
        book.wildcard_address = vec![BookAddress {
            name: "printers".into(),
            value: "10.0.0.9/255.0.255.255".into(),
            description: "all sites".into(),
        }];
        book.address_set = vec![BookAddressSet {
            name: "devices".into(),
            address: vec!["printers".into()],
            address_set: Vec::new(),
            description: String::new(),
        }];
        let batch = book.compile(&DeviceContext::default(), &Resolved::default()).unwrap();
        let dump: Vec<String> = batch
            .to_lines()
            .iter()
            .map(|l| l.replacen("set security address-book shared", "set", 1))
            .collect();
        assert_eq!(AddressBook::parse(&"shared".to_owned(), &dump.join("\n")).unwrap(), book);
    }
}
