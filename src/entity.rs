// impctl - CLI for the impCentral device management API
// Copyright (C) 2025 The impctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fmt;

/// The closed set of impCentral entity kinds an identifier can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Account,
    Product,
    DeviceGroup,
    Device,
    Deployment,
    Webhook,
    LoginKey,
}

impl EntityType {
    /// Name used in user-facing messages ("Device Group \"x\" is not found.").
    pub fn display_name(self) -> &'static str {
        match self {
            EntityType::Account => "Account",
            EntityType::Product => "Product",
            EntityType::DeviceGroup => "Device Group",
            EntityType::Device => "Device",
            EntityType::Deployment => "Deployment",
            EntityType::Webhook => "Webhook",
            EntityType::LoginKey => "Login Key",
        }
    }

    /// Attributes eligible for free-form lookup, in search-preference order.
    /// Raw ids are handled separately (the id path never reaches an
    /// attribute search), so `id` is not listed here.
    pub fn lookup_attributes(self) -> &'static [&'static str] {
        match self {
            EntityType::Account => &["username", "email"],
            EntityType::Product => &["name"],
            EntityType::DeviceGroup => &["name"],
            EntityType::Device => &["name", "mac_address", "agent_id"],
            EntityType::Deployment => &["sha", "tag"],
            EntityType::Webhook => &["url"],
            EntityType::LoginKey => &["description"],
        }
    }

    /// Containment chain for hierarchical identifiers, outermost level
    /// first. Types without a bracketed form have a chain of one.
    pub fn hierarchy(self) -> &'static [EntityType] {
        match self {
            EntityType::Product => &[EntityType::Account, EntityType::Product],
            EntityType::DeviceGroup => &[
                EntityType::Account,
                EntityType::Product,
                EntityType::DeviceGroup,
            ],
            EntityType::Account => &[EntityType::Account],
            EntityType::Device => &[EntityType::Device],
            EntityType::Deployment => &[EntityType::Deployment],
            EntityType::Webhook => &[EntityType::Webhook],
            EntityType::LoginKey => &[EntityType::LoginKey],
        }
    }

    /// REST collection path under the API base URL.
    pub fn collection_path(self) -> &'static str {
        match self {
            EntityType::Account => "accounts",
            EntityType::Product => "products",
            EntityType::DeviceGroup => "devicegroups",
            EntityType::Device => "devices",
            EntityType::Deployment => "deployments",
            EntityType::Webhook => "webhooks",
            EntityType::LoginKey => "accounts/me/login_keys",
        }
    }

    /// Query parameter that restricts a listing of `self` to children of
    /// `parent`, where the API supports such a filter.
    pub fn scope_filter(self, parent: EntityType) -> Option<&'static str> {
        match (self, parent) {
            (EntityType::Product, EntityType::Account) => Some("filter[owner.id]"),
            (EntityType::DeviceGroup, EntityType::Account) => Some("filter[owner.id]"),
            (EntityType::DeviceGroup, EntityType::Product) => Some("filter[product.id]"),
            (EntityType::Device, EntityType::DeviceGroup) => Some("filter[devicegroup.id]"),
            (EntityType::Device, EntityType::Product) => Some("filter[product.id]"),
            (EntityType::Deployment, EntityType::DeviceGroup) => Some("filter[devicegroup.id]"),
            (EntityType::Webhook, EntityType::DeviceGroup) => Some("filter[devicegroup.id]"),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_group_hierarchy_is_account_product_group() {
        assert_eq!(
            EntityType::DeviceGroup.hierarchy(),
            &[
                EntityType::Account,
                EntityType::Product,
                EntityType::DeviceGroup
            ]
        );
        assert_eq!(EntityType::Device.hierarchy(), &[EntityType::Device]);
    }

    #[test]
    fn name_is_the_first_lookup_attribute_for_devices() {
        assert_eq!(EntityType::Device.lookup_attributes()[0], "name");
        assert_eq!(EntityType::Product.lookup_attributes(), &["name"]);
    }

    #[test]
    fn scope_filters_map_to_api_query_params() {
        assert_eq!(
            EntityType::DeviceGroup.scope_filter(EntityType::Product),
            Some("filter[product.id]")
        );
        assert_eq!(EntityType::Product.scope_filter(EntityType::Device), None);
    }
}
