// src/browser/scripts.rs

//! In-page scripts. Each one is a self-invoking expression that returns a
//! plain JSON object.

/// Anchors + iframes on the page, plus a best-effort module/page heading.
pub const PAGE_LINKS: &str = r#"(() => {
    const out = { heading: null, breadcrumb: null, links: [] };

    const crumbs = document.querySelectorAll('#breadcrumbs li, nav[aria-label*="breadcrumb" i] li');
    if (crumbs.length > 1) {
        out.breadcrumb = (crumbs[crumbs.length - 2].textContent || '').trim() || null;
    }
    const h = document.querySelector('.module-sequence-footer .module-title, h1.page-title, h1, h2');
    if (h) out.heading = (h.textContent || '').trim() || null;

    document.querySelectorAll('a[href]').forEach(a => {
        out.links.push({ type: 'anchor', text: (a.textContent || '').trim(), href: a.href });
    });
    document.querySelectorAll('iframe[src]').forEach(f => {
        const src = f.src;
        if (src && !src.startsWith('about:') && !src.startsWith('javascript:')) {
            out.links.push({
                type: 'iframe',
                text: f.title || f.getAttribute('aria-label') || 'Embedded iframe',
                href: src,
            });
        }
    });
    return out;
})()"#;

/// Every `/modules/items/` link on a Canvas modules index, with its module.
pub const MODULE_ITEMS: &str = r#"(() => {
    const items = [];
    document.querySelectorAll('.context_module').forEach(mod => {
        const nameEl = mod.querySelector('.ig-header .name, .ig-header strong');
        const moduleName = nameEl
            ? nameEl.textContent.trim()
            : (mod.getAttribute('aria-label') || 'Unknown Module');
        mod.querySelectorAll('a.ig-title[href*="/modules/items/"]').forEach(a => {
            items.push({ moduleName, text: (a.textContent || '').trim(), href: a.href });
        });
    });
    return { items };
})()"#;

/// Marker for an authenticated Canvas shell.
pub const LOGIN_STATE: &str = r#"(() => ({
    hasCanvasDom: document.querySelector('#content, .user_content, .ic-app') !== null
}))()"#;

/// Clicks the first visible transcript control and remembers it so
/// [`RESTORE_TRANSCRIPT_CONTROL`] can toggle it back.
pub const ACTIVATE_TRANSCRIPT_CONTROL: &str = r#"(() => {
    for (const el of document.querySelectorAll('button, a, div[role="button"], [aria-controls]')) {
        const text = (el.textContent || '').toLowerCase();
        const aria = (el.getAttribute('aria-label') || '').toLowerCase();
        const ctrl = (el.getAttribute('aria-controls') || '').toLowerCase();
        if (!(text.includes('transcript') || aria.includes('transcript') || ctrl.includes('transcript'))) continue;
        const rect = el.getBoundingClientRect();
        if (rect.width <= 0 || rect.height <= 0) continue;
        el.click();
        window.__ctTranscriptControl = el;
        return { clicked: true, label: (el.getAttribute('aria-label') || el.textContent || '').trim().substring(0, 80) };
    }
    return { clicked: false, label: null };
})()"#;

pub const READ_TRANSCRIPT_PANEL: &str = r#"(() => {
    const selectors = [
        '.kaltura-transcript', '.transcript-panel', '[class*="transcript"]', '[id*="transcript"]',
        '[aria-label*="transcript" i]', '[data-testid*="transcript"]'
    ];
    for (const sel of selectors) {
        for (const el of document.querySelectorAll(sel)) {
            const tag = el.tagName.toLowerCase();
            if (tag === 'script' || tag === 'style' || tag === 'noscript' || tag === 'button') continue;
            const rect = el.getBoundingClientRect();
            if (rect.width <= 0 || rect.height <= 0) continue;
            const text = (el.innerText || el.textContent || '').trim();
            if (text.length > 50 && text.length < 50000) return { text, selector: sel };
        }
    }
    return { text: null, selector: null };
})()"#;

pub const RESTORE_TRANSCRIPT_CONTROL: &str = r#"(() => {
    const el = window.__ctTranscriptControl;
    if (!el) return { restored: false };
    el.click();
    delete window.__ctTranscriptControl;
    return { restored: true };
})()"#;

/// `<track>` sources and caption-file URLs embedded in player scripts.
pub const CAPTION_TRACK_REFS: &str = r#"(() => {
    const urls = [];
    document.querySelectorAll('track[kind="subtitles"], track[kind="captions"]').forEach(t => {
        if (t.src) urls.push(t.src);
    });
    for (const s of document.querySelectorAll('script')) {
        const c = s.textContent || '';
        urls.push(...(c.match(/https?:[^"'\s]+\.(?:vtt|srt)[^"'\s]*/gi) || []));
    }
    return { urls: [...new Set(urls)] };
})()"#;

/// Any visible region that looks like a transcript or caption container.
pub const CAPTION_REGION_SCAN: &str = r#"(() => {
    const selectors = [
        '[class*="transcript"]', '[id*="transcript"]',
        '[class*="caption"]',
        '[role="tabpanel"]:not([aria-hidden="true"])',
        '[aria-label*="transcript"]', '[aria-label*="caption"]',
        '[data-testid*="transcript"]',
        '.kaltura-transcript', '.transcript-panel', '.captions-panel'
    ];
    for (const sel of selectors) {
        for (const el of document.querySelectorAll(sel)) {
            const rect = el.getBoundingClientRect();
            if (rect.width <= 0 || rect.height <= 0) continue;
            const tag = el.tagName.toLowerCase();
            if (tag === 'script' || tag === 'style' || tag === 'noscript') continue;
            const text = (el.textContent || '').trim();
            if (text.length > 50 && text.length < 50000) return { text, selector: sel };
        }
    }
    return { text: null, selector: null };
})()"#;

pub const VIDEO_METADATA: &str = r#"(() => {
    const data = { title: null, entryId: null, duration: null };
    const titleEl = document.querySelector('h1, h2, [class*="title"], [itemprop="name"]');
    if (titleEl) data.title = (titleEl.textContent || '').trim() || null;
    const og = document.querySelector('meta[property="og:title"]');
    if (og && og.content) data.title = og.content;
    for (const script of document.querySelectorAll('script')) {
        const m = (script.textContent || '').match(/entryId["']?\s*:\s*["']?([a-z0-9_]+)/i);
        if (m) { data.entryId = m[1]; break; }
    }
    const dur = document.querySelector('[class*="duration"], [class*="time"]');
    if (dur) data.duration = (dur.textContent || '').trim() || null;
    return data;
})()"#;

pub const DEBUG_CAPTION_ELEMENTS: &str = r#"(() => {
    const elements = [];
    document.querySelectorAll(
        'button, a, div[role="button"], [aria-label], [aria-controls], ' +
        '[class*="transcript"], [class*="caption"], [id*="transcript"], [id*="caption"]'
    ).forEach(el => {
        const tag = el.tagName.toUpperCase();
        if (tag === 'STYLE' || tag === 'SCRIPT' || tag === 'NOSCRIPT') return;
        const text = (el.textContent || '').toLowerCase();
        const aria = (el.getAttribute('aria-label') || '').toLowerCase();
        const cls = (typeof el.className === 'string' ? el.className : '').toLowerCase();
        const id = (el.id || '').toLowerCase();
        if (text.includes('transcript') || text.includes('captions') || text.includes('subtitle') ||
            aria.includes('transcript') || aria.includes('caption') || aria.includes('cc') ||
            cls.includes('transcript') || cls.includes('caption') ||
            id.includes('transcript') || id.includes('caption')) {
            const rect = el.getBoundingClientRect();
            elements.push({
                tag: el.tagName, id: el.id || null,
                text: (el.textContent || '').trim().substring(0, 100),
                ariaLabel: el.getAttribute('aria-label'),
                className: typeof el.className === 'string' ? el.className : null,
                visible: rect.width > 0 && rect.height > 0,
            });
        }
    });
    return { elements };
})()"#;

pub const DEBUG_TRACKS: &str = r#"(() => {
    const tracks = [];
    document.querySelectorAll('track[kind="subtitles"], track[kind="captions"]').forEach(t => {
        tracks.push({ kind: t.kind, src: t.src, srclang: t.srclang, label: t.label });
    });
    const iframes = [];
    document.querySelectorAll('iframe').forEach(f => iframes.push({ src: f.src, title: f.title }));
    return { tracks, iframes };
})()"#;

pub const DEBUG_BUTTONS: &str = r#"(() => {
    const res = { transcriptButtons: [], captionsButtons: [] };
    document.querySelectorAll('button, a, div[role="button"], [aria-label], [aria-controls]').forEach(el => {
        const text = (el.textContent || '').toLowerCase();
        const aria = (el.getAttribute('aria-label') || '').toLowerCase();
        const ctrl = (el.getAttribute('aria-controls') || '').toLowerCase();
        const info = {
            tag: el.tagName,
            text: (el.textContent || '').trim().substring(0, 50),
            ariaLabel: el.getAttribute('aria-label'),
            visible: el.offsetParent !== null,
        };
        if (text.includes('transcript') || aria.includes('transcript') || ctrl.includes('transcript'))
            res.transcriptButtons.push(info);
        if (text.includes('cc') || text.includes('captions') || text.includes('subtitle') ||
            aria.includes('cc') || aria.includes('captions'))
            res.captionsButtons.push(info);
    });
    return res;
})()"#;

pub const PLAYER_CONFIG: &str = r#"(() => {
    const data = { entryId: null, mediaId: null, captions: [], captionUrls: [] };
    for (const s of document.querySelectorAll('script')) {
        const c = s.textContent || '';
        const em = c.match(/entryId["']?\s*:\s*["']?([a-z0-9_]+)/i);
        if (em) data.entryId = em[1];
        const mm = c.match(/mediaId["']?\s*:\s*["']?([a-z0-9_]+)/i);
        if (mm) data.mediaId = mm[1];
        const cm = c.match(/"captions"\s*:\s*\[(.*?)\]/);
        if (cm) data.captions = [cm[1]];
        data.captionUrls.push(
            ...(c.match(/https?:[^"'\s]+\.(?:vtt|srt)[^"'\s]*/gi) || []),
            ...(c.match(/https?:[^"'\s]*(?:caption|transcript|subtitle)[^"'\s]*/gi) || [])
        );
    }
    data.captionUrls = [...new Set(data.captionUrls)];
    return data;
})()"#;
