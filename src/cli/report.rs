use enforcement_agent::HIDDEN_MARKER;
use page_dom::{Document, MemoryDocument, NodeId};
use serde::Serialize;

/// Visibility of one element after the agent ran.
#[derive(Clone, Debug, Serialize)]
pub struct ElementReport {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    pub visible: bool,
    pub hidden_by_agent: bool,
    /// Inline style as the page would serialize it.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub style: String,
}

impl ElementReport {
    pub fn selector(&self) -> String {
        let mut out = self.tag.clone();
        if let Some(id) = &self.id {
            out.push('#');
            out.push_str(id);
        }
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        out
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PageReport {
    pub elements: Vec<ElementReport>,
    pub hidden: usize,
}

pub fn page_report(document: &MemoryDocument) -> PageReport {
    let elements: Vec<ElementReport> = document
        .elements()
        .into_iter()
        .map(|node| element_report(document, node))
        .collect();
    let hidden = elements.iter().filter(|element| !element.visible).count();
    PageReport { elements, hidden }
}

fn element_report(document: &MemoryDocument, node: NodeId) -> ElementReport {
    ElementReport {
        tag: document.tag(node).unwrap_or_default(),
        id: document.element_id(node),
        classes: document.class_list(node),
        visible: document.is_rendered(node),
        hidden_by_agent: document.data(node, HIDDEN_MARKER).is_some(),
        style: document.style_text(node),
    }
}

pub fn print_page_report(report: &PageReport) {
    for element in &report.elements {
        let state = if element.visible { "visible" } else { "hidden" };
        println!("{state:<8}{}", element.selector());
    }
    println!(
        "{} of {} element(s) hidden",
        report.hidden,
        report.elements.len()
    );
}
