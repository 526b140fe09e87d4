//! Budget packer: order, estimate, greedily admit, then (in strict mode)
//! render and trim until the true token count fits.

use std::cmp::Reverse;

use tracing::debug;

use crate::config::SelectionPolicy;
use crate::core::{FileEntry, OutputFormat, PackOrder};
use crate::error::Result;
use crate::format::{Renderer, instruction_footer, instruction_preface, language_for};
use crate::utils::tokens::TokenCounter;

/// Slack added to the markdown marker estimate.
const MARKDOWN_SLACK: usize = 12;

#[derive(Debug, Clone, Default)]
pub struct PackOutcome {
    pub selected: Vec<FileEntry>,
    /// The wrapped bundle, present whenever strict packing ran.
    pub rendered: Option<String>,
    /// True oracle count of `rendered`.
    pub tokens: Option<usize>,
}

/// Stable sort by the policy's pack order.
pub fn order_files(files: &mut [FileEntry], order: PackOrder) {
    match order {
        PackOrder::SmallFirst => files.sort_by_key(|f| f.tokens),
        PackOrder::LargeFirst => files.sort_by_key(|f| Reverse(f.tokens)),
        PackOrder::Path => files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path)),
    }
}

/// Cost of the header and duplicated instruction blocks, paid once.
fn preamble_estimate(policy: &SelectionPolicy, counter: &dyn TokenCounter) -> usize {
    let header = match policy.header.as_deref() {
        Some(h) if !h.is_empty() => counter.count(&format!("{h}\n\n")),
        _ => 0,
    };
    let prompt = match policy.prompt.as_deref() {
        Some(p) if !p.is_empty() => {
            let preface = instruction_preface(p);
            let bottom = instruction_footer(&preface);
            counter.count(&preface) + counter.count(bottom) + 2
        }
        _ => 0,
    };
    header + prompt
}

/// File tokens plus the open/close markers of the active wrapping style.
fn file_estimate(file: &FileEntry, policy: &SelectionPolicy, counter: &dyn TokenCounter) -> usize {
    let markers = if policy.xml_wrap {
        let open = format!(
            "<file path=\"{}\" bytes=\"{}\" lines=\"{}\" tokens=\"{}\" language=\"{}\">\n<![CDATA[\n",
            file.rel_path,
            file.bytes,
            file.lines,
            file.tokens,
            language_for(&file.rel_path, &file.extension)
        );
        counter.count(&open) + counter.count("\n]]>\n</file>\n\n")
    } else if policy.tags_wrap {
        let open = format!("<FILE path=\"{}\">\n", file.rel_path);
        counter.count(&open) + counter.count("\n</FILE>\n\n")
    } else if policy.format == OutputFormat::Markdown {
        let heading = format!("### {}\n\n", file.rel_path);
        let fences = if policy.code_fences {
            format!("\n```{}\n```\n", language_for(&file.rel_path, &file.extension))
        } else {
            "\n".to_string()
        };
        counter.count(&heading) + counter.count(&fences) + MARKDOWN_SLACK
    } else {
        let heading = format!("### {}\n", file.rel_path);
        counter.count(&heading) + counter.count(&policy.block_separator)
    };
    file.tokens + markers
}

/// Packs `eligible` into the policy's token budget. Without a budget every
/// file is returned unchanged and nothing is rendered.
pub fn pack(
    eligible: &[FileEntry],
    policy: &SelectionPolicy,
    counter: &dyn TokenCounter,
) -> Result<PackOutcome> {
    let Some(budget) = policy.max_tokens else {
        return Ok(PackOutcome {
            selected: eligible.to_vec(),
            ..Default::default()
        });
    };

    let mut ordered = eligible.to_vec();
    order_files(&mut ordered, policy.pack_order);

    let mut running = preamble_estimate(policy, counter);
    let mut selected = Vec::new();
    for file in ordered {
        let approx = file_estimate(&file, policy, counter);
        if running + approx <= budget {
            running += approx;
            selected.push(file);
        }
    }
    debug!(
        budget,
        estimate = running,
        admitted = selected.len(),
        candidates = eligible.len(),
        "greedy admission"
    );

    if !policy.strict {
        return Ok(PackOutcome {
            selected,
            ..Default::default()
        });
    }

    let mut renderer = Renderer::new();
    loop {
        let rendered = renderer.render_bundle(&selected, policy)?;
        let tokens = counter.count(&rendered);
        if tokens <= budget || selected.is_empty() {
            debug!(tokens, selected = selected.len(), "strict pack settled");
            return Ok(PackOutcome {
                selected,
                rendered: Some(rendered),
                tokens: Some(tokens),
            });
        }
        selected.pop();
    }
}

/// A finished bundle ready to write out.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub text: String,
    pub selected: Vec<FileEntry>,
    /// Oracle count when strict packing ran, otherwise the sum of file tokens.
    pub tokens: usize,
    pub exact: bool,
}

/// Pack, then render whatever the packer did not already render.
pub fn bundle(
    eligible: &[FileEntry],
    policy: &SelectionPolicy,
    counter: &dyn TokenCounter,
) -> Result<Bundle> {
    let PackOutcome {
        selected,
        rendered,
        tokens,
    } = pack(eligible, policy, counter)?;
    let text = match rendered {
        Some(text) => text,
        None => Renderer::new().render_bundle(&selected, policy)?,
    };
    let exact = tokens.is_some();
    let tokens = tokens.unwrap_or_else(|| selected.iter().map(|f| f.tokens).sum());
    Ok(Bundle {
        text,
        selected,
        tokens,
        exact,
    })
}
