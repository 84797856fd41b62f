use std::fmt::Write;

use xq_core::{truncate_chars, Post, TagPolicy};

use crate::tags::Vocabulary;

/// Renders the single instruction sent for one batch.
pub fn render_batch_prompt(
    batch: &[Post],
    vocabulary: &Vocabulary,
    known_subtags: &[String],
    snippet_chars: usize,
    custom_prompt: Option<&str>,
) -> String {
    let mut prompt = String::new();

    if let Some(custom) = custom_prompt.map(str::trim).filter(|c| !c.is_empty()) {
        let _ = writeln!(prompt, "读者的个性化要求：{}\n", custom);
    }

    let _ = writeln!(
        prompt,
        "你是一位技术内容编辑。请为以下 {} 篇文章分别撰写简洁的中文摘要（2-3句话），并为每篇文章标注 1-3 个标签。\n",
        batch.len()
    );

    let permitted = vocabulary.permitted().join(", ");
    match vocabulary.policy() {
        TagPolicy::Flat => {
            let _ = writeln!(prompt, "可用标签（只能从中选择）：{}", permitted);
        }
        TagPolicy::Hierarchical => {
            let _ = writeln!(prompt, "一级标签（标签的第一段必须从中选择）：{}", permitted);
            let _ = writeln!(
                prompt,
                "标签格式为 \"一级/二级/三级\"，最多三级，例如 \"AI/LLM/Agent\"。"
            );
            if !known_subtags.is_empty() {
                let _ = writeln!(
                    prompt,
                    "已有的细分标签（含义相同时请优先复用，不要创造近义的新标签）：{}",
                    known_subtags.join(", ")
                );
            }
        }
    }

    prompt.push_str("\n文章列表：\n");
    for (i, post) in batch.iter().enumerate() {
        let _ = writeln!(prompt, "\n{}. 标题：{}", i + 1, post.title);
        let _ = writeln!(prompt, "   来源：{}", post.feed_title);
        if !post.category.is_empty() {
            let _ = writeln!(prompt, "   分类：{}", post.category);
        }
        let _ = writeln!(prompt, "   内容：{}", truncate_chars(&post.content, snippet_chars));
    }

    prompt.push_str(
        "\n请以JSON格式回复，index 为文章序号：\n\
         {\"articles\": [{\"index\": 1, \"summary_zh\": \"中文摘要\", \"tags\": [\"标签\"]}]}\n\n\
         只返回JSON，不要其他内容。",
    );
    prompt
}
