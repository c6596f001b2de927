//! Prompt text sent to the language model.

use crate::campaign::Platform;

pub const ARTICLE_SYSTEM_PROMPT: &str =
    "你是一位专业的 SEO 内容创作专家，擅长撰写高质量、符合搜索引擎优化的文章。";

pub const INTERVIEW_SYSTEM_PROMPT: &str =
    "你是一位内容策划编辑，负责在写作前向领域专家收集一手知识。";

/// Article prompt for a keyword, optionally grounded in collected knowledge.
pub fn article_prompt(keyword: &str, topic: &str, knowledge: &str, platforms: &[Platform]) -> String {
    let mut prompt = format!(
        "你是一位专业的 SEO 内容撰写专家。请基于以下关键词撰写一篇 SEO 优化的文章。\n\n\
         关键词：{keyword}\n\
         主题方向：{topic}\n"
    );

    if !platforms.is_empty() {
        let names: Vec<String> = platforms.iter().map(ToString::to_string).collect();
        prompt.push_str(&format!("发布平台：{}\n", names.join("、")));
    }

    if !knowledge.trim().is_empty() {
        prompt.push_str(&format!(
            "\n以下是领域专家提供的背景知识，请优先采用其中的事实和观点：\n{}\n",
            knowledge.trim()
        ));
    }

    prompt.push_str(
        "\n要求：\n\
         1. 文章长度：800-1200字\n\
         2. 输出格式：HTML (使用 <article> 标签包裹)\n\
         3. 使用 H2/H3 标签构建语义化的标题层级\n\
         4. 自然融入关键词，避免过度堆砌\n\
         5. 包含实用的信息和案例\n\n\
         请以 JSON 格式返回以下内容：\n\
         {\n\
           \"title\": \"文章标题（吸引人且包含关键词）\",\n\
           \"slug\": \"URL友好的短链（英文，用连字符分隔）\",\n\
           \"meta_description\": \"SEO描述（150-160字符，包含关键词）\",\n\
           \"html_body\": \"完整的HTML文章内容\",\n\
           \"social_snippet\": \"社交媒体摘要（<280字符，包含emoji和话题标签）\"\n\
         }\n\n\
         只返回 JSON，不要其他内容。",
    );
    prompt
}

/// Prompt asking for interview questions about a keyword.
pub fn questions_prompt(keyword: &str) -> String {
    format!(
        "我们即将围绕关键词「{keyword}」撰写一篇文章。\n\
         请提出 2-3 个开放式问题，帮助我们从专家那里获得独特的一手经验、数据或观点。\n\
         问题要具体、简短，避免可以直接搜索到答案的问题。\n\n\
         以 JSON 字符串数组返回，例如：[\"问题1\", \"问题2\"]\n\
         只返回 JSON 数组，不要其他内容。"
    )
}

/// Prompt restructuring a free-form reply into a Q/A transcript.
pub fn structure_prompt(keyword: &str, questions: &[String], answer: &str) -> String {
    let listed: Vec<String> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {q}", i + 1))
        .collect();
    format!(
        "关键词：{keyword}\n\n\
         我们向专家提出了以下问题：\n{questions}\n\n\
         专家的原始回复：\n{answer}\n\n\
         请把回复整理成问答形式的知识摘要，每个问题一段，格式为：\n\
         Q: 问题\nA: 对应的回答\n\n\
         只使用回复中出现的信息；某个问题没有回答时写「未提及」。只返回整理后的文本。",
        questions = listed.join("\n"),
        answer = answer.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_prompt_includes_knowledge_only_when_present() {
        let with = article_prompt("零知识证明", "Web3 隐私", "Q: a\nA: b", &[Platform::Website]);
        assert!(with.contains("关键词：零知识证明"));
        assert!(with.contains("Q: a"));
        assert!(with.contains("发布平台：Website"));

        let without = article_prompt("零知识证明", "Web3 隐私", "  ", &[]);
        assert!(!without.contains("背景知识"));
        assert!(!without.contains("发布平台"));
    }

    #[test]
    fn structure_prompt_numbers_questions() {
        let prompt = structure_prompt("k", &["一?".to_string(), "二?".to_string()], " 回答 ");
        assert!(prompt.contains("1. 一?"));
        assert!(prompt.contains("2. 二?"));
        assert!(prompt.contains("专家的原始回复：\n回答"));
    }
}
