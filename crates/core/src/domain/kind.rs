use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::approvals::policy::{ApprovalPolicy, ORDER_COORDINATION_ROLES};
use crate::errors::DomainError;

/// Business document families that carry an approval table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    PurchaseRfq,
    SalesRfq,
    SalesQuotation,
    SalesOrder,
    SalesInvoice,
    PurchaseInvoice,
    SupplierQuotation,
    PurchaseOrder,
}

impl ApprovalKind {
    pub const ALL: [ApprovalKind; 8] = [
        Self::PurchaseRfq,
        Self::SalesRfq,
        Self::SalesQuotation,
        Self::SalesOrder,
        Self::SalesInvoice,
        Self::PurchaseInvoice,
        Self::SupplierQuotation,
        Self::PurchaseOrder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PurchaseRfq => "purchase_rfq",
            Self::SalesRfq => "sales_rfq",
            Self::SalesQuotation => "sales_quotation",
            Self::SalesOrder => "sales_order",
            Self::SalesInvoice => "sales_invoice",
            Self::PurchaseInvoice => "purchase_invoice",
            Self::SupplierQuotation => "supplier_quotation",
            Self::PurchaseOrder => "purchase_order",
        }
    }

    /// Path segment under `/api/v1`.
    pub fn route_slug(self) -> &'static str {
        match self {
            Self::PurchaseRfq => "purchase-rfq-approvals",
            Self::SalesRfq => "sales-rfq-approvals",
            Self::SalesQuotation => "sales-quotation-approvals",
            Self::SalesOrder => "sales-order-approvals",
            Self::SalesInvoice => "sales-invoice-approvals",
            Self::PurchaseInvoice => "purchase-invoice-approvals",
            Self::SupplierQuotation => "supplier-quotation-approvals",
            Self::PurchaseOrder => "po-approvals",
        }
    }

    /// Name of the document foreign key as clients and messages spell it.
    pub fn entity_field(self) -> &'static str {
        match self {
            Self::PurchaseRfq => "PurchaseRFQID",
            Self::SalesRfq => "SalesRFQID",
            Self::SalesQuotation => "SalesQuotationID",
            Self::SalesOrder => "SalesOrderID",
            Self::SalesInvoice => "SalesInvoiceID",
            Self::PurchaseInvoice => "PInvoiceID",
            Self::SupplierQuotation => "SupplierQuotationID",
            Self::PurchaseOrder => "POID",
        }
    }

    /// Key under which response envelopes echo the document id.
    pub fn envelope_id_key(self) -> &'static str {
        match self {
            Self::PurchaseRfq => "purchaseRFQId",
            Self::SalesRfq => "salesRFQId",
            Self::SalesQuotation => "salesQuotationId",
            Self::SalesOrder => "salesOrderId",
            Self::SalesInvoice => "salesInvoiceId",
            Self::PurchaseInvoice => "pInvoiceId",
            Self::SupplierQuotation => "supplierQuotationId",
            Self::PurchaseOrder => "poId",
        }
    }

    pub fn form_name(self) -> &'static str {
        match self {
            Self::PurchaseRfq => "Purchase RFQ",
            Self::SalesRfq => "Sales RFQ",
            Self::SalesQuotation => "Sales Quotation",
            Self::SalesOrder => "Sales Order",
            Self::SalesInvoice => "Sales Invoice",
            Self::PurchaseInvoice => "Purchase Invoice",
            Self::SupplierQuotation => "Supplier Quotation",
            Self::PurchaseOrder => "Purchase Order",
        }
    }

    pub fn approval_table(self) -> &'static str {
        match self {
            Self::PurchaseRfq => "purchase_rfq_approval",
            Self::SalesRfq => "sales_rfq_approval",
            Self::SalesQuotation => "sales_quotation_approval",
            Self::SalesOrder => "sales_order_approval",
            Self::SalesInvoice => "sales_invoice_approval",
            Self::PurchaseInvoice => "purchase_invoice_approval",
            Self::SupplierQuotation => "supplier_quotation_approval",
            Self::PurchaseOrder => "po_approval",
        }
    }

    pub fn document_table(self) -> &'static str {
        match self {
            Self::PurchaseRfq => "purchase_rfq",
            Self::SalesRfq => "sales_rfq",
            Self::SalesQuotation => "sales_quotation",
            Self::SalesOrder => "sales_order",
            Self::SalesInvoice => "sales_invoice",
            Self::PurchaseInvoice => "purchase_invoice",
            Self::SupplierQuotation => "supplier_quotation",
            Self::PurchaseOrder => "purchase_order",
        }
    }

    /// Column holding the document id, shared by the document and approval tables.
    pub fn entity_column(self) -> &'static str {
        match self {
            Self::PurchaseRfq => "purchase_rfq_id",
            Self::SalesRfq => "sales_rfq_id",
            Self::SalesQuotation => "sales_quotation_id",
            Self::SalesOrder => "sales_order_id",
            Self::SalesInvoice => "sales_invoice_id",
            Self::PurchaseInvoice => "purchase_invoice_id",
            Self::SupplierQuotation => "supplier_quotation_id",
            Self::PurchaseOrder => "po_id",
        }
    }

    /// Approvals of these kinds must name the form and role the approver acts under.
    pub fn is_form_role_scoped(self) -> bool {
        matches!(self, Self::SalesRfq | Self::SupplierQuotation)
    }

    pub fn policy(self) -> ApprovalPolicy {
        match self {
            Self::PurchaseRfq => ApprovalPolicy::Roles(ORDER_COORDINATION_ROLES),
            _ => ApprovalPolicy::AnyAuthenticated,
        }
    }

    pub fn from_form_name(value: &str) -> Option<Self> {
        let wanted = value.trim();
        Self::ALL.into_iter().find(|kind| kind.form_name().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for ApprovalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.form_name())
    }
}

impl FromStr for ApprovalKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == key || kind.route_slug() == key)
            .ok_or_else(|| DomainError::InvalidField {
                field: "kind".to_string(),
                expected: "a known approval kind".to_string(),
            })
    }
}
